use crate::selector::ImagePathSelector;
use crate::selector::Segment::{Each, Key};
use k8s_openapi::Resource;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};

static POD_TEMPLATE_IMAGES: ImagePathSelector = ImagePathSelector::new(&[
    Key("spec"),
    Key("template"),
    Key("spec"),
    Key("containers"),
    Each,
    Key("image"),
]);

// CronJob nests its pod template one level deeper, under the job template
static JOB_TEMPLATE_IMAGES: ImagePathSelector = ImagePathSelector::new(&[
    Key("spec"),
    Key("jobTemplate"),
    Key("spec"),
    Key("template"),
    Key("spec"),
    Key("containers"),
    Each,
    Key("image"),
]);

/// Workload kinds whose container images can be bumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Deployment,
    StatefulSet,
    Job,
    CronJob,
}

static SUPPORTED_KINDS: [(&str, ResourceKind); 4] = [
    (Deployment::KIND, ResourceKind::Deployment),
    (StatefulSet::KIND, ResourceKind::StatefulSet),
    (Job::KIND, ResourceKind::Job),
    (CronJob::KIND, ResourceKind::CronJob),
];

impl ResourceKind {
    /// Maps a manifest's `kind` value, `None` for anything outside the supported set.
    pub fn from_kind(kind: &str) -> Option<Self> {
        SUPPORTED_KINDS
            .iter()
            .find(|(name, _)| *name == kind)
            .map(|(_, resource_kind)| *resource_kind)
    }

    pub fn name(self) -> &'static str {
        SUPPORTED_KINDS
            .iter()
            .find(|(_, resource_kind)| *resource_kind == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    pub fn image_selector(self) -> &'static ImagePathSelector {
        match self {
            ResourceKind::Deployment | ResourceKind::StatefulSet | ResourceKind::Job => {
                &POD_TEMPLATE_IMAGES
            }
            ResourceKind::CronJob => &JOB_TEMPLATE_IMAGES,
        }
    }
}
