//! Well-known names shared by the garden API and the admission plugins.

/// The finalizer the garden controllers put on every object they manage.
pub const GARDENER_FINALIZER: &str = "gardener";

/// Explicit expiration time of a Shoot, in RFC 3339 format.
pub const ANNOTATION_SHOOT_EXPIRATION_TIMESTAMP: &str = "shoot.gardener.cloud/expiration-timestamp";

/// Names the user that created an object.
pub const ANNOTATION_CREATED_BY: &str = "gardener.cloud/created-by";

pub const LABEL_ROLE: &str = "gardener.cloud/role";
pub const ROLE_DEFAULT_DOMAIN: &str = "default-domain";

pub const ANNOTATION_DNS_DOMAIN: &str = "dns.gardener.cloud/domain";
pub const ANNOTATION_DNS_PROVIDER: &str = "dns.gardener.cloud/provider";
pub const ANNOTATION_DNS_DEFAULT_DOMAIN_PRIORITY: &str =
    "dns.gardener.cloud/domain-default-priority";

pub const SUBRESOURCE_BINDING: &str = "binding";

pub const SERVICE_ACCOUNT_USER_PREFIX: &str = "system:serviceaccount:";

// Quota metrics.
pub const METRIC_CPU: &str = "cpu";
pub const METRIC_GPU: &str = "gpu";
pub const METRIC_MEMORY: &str = "memory";
pub const METRIC_STORAGE_STANDARD: &str = "storage.standard";
pub const METRIC_STORAGE_PREMIUM: &str = "storage.premium";
pub const METRIC_LOADBALANCER: &str = "loadbalancer";

pub const VOLUME_CLASS_STANDARD: &str = "standard";
pub const VOLUME_CLASS_PREMIUM: &str = "premium";

pub const QUOTA_SCOPE_PROJECT: &str = "Project";

pub const KIND_SECRET: &str = "Secret";
pub const KIND_WORKLOAD_IDENTITY: &str = "WorkloadIdentity";
pub const KIND_CLOUD_PROFILE: &str = "CloudProfile";
pub const KIND_NAMESPACED_CLOUD_PROFILE: &str = "NamespacedCloudProfile";

pub const PROJECT_MEMBER_KIND_USER: &str = "User";
pub const PROJECT_MEMBER_KIND_GROUP: &str = "Group";
pub const PROJECT_MEMBER_KIND_SERVICE_ACCOUNT: &str = "ServiceAccount";
