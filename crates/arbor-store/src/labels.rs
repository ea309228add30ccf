//! Edge labels used by the store.

// ── Store root ───────────────────────────────────────────────────
pub const HAS_PROJECT_ROOT: &str = "HAS_PROJECT_ROOT";
pub const HAS_USER_ROOT: &str = "HAS_USER_ROOT";
/// From the store root to the global schema root, or from a project to its own.
pub const HAS_SCHEMA_ROOT: &str = "HAS_SCHEMA_ROOT";

// ── Membership ───────────────────────────────────────────────────
pub const HAS_PROJECT: &str = "HAS_PROJECT";
pub const HAS_USER: &str = "HAS_USER";
pub const HAS_SCHEMA_CONTAINER_ITEM: &str = "HAS_SCHEMA_CONTAINER_ITEM";
pub const HAS_TAG_FAMILY: &str = "HAS_TAG_FAMILY";
pub const HAS_TAG: &str = "HAS_TAG";
pub const HAS_NODE: &str = "HAS_NODE";

pub const MEMBERSHIP: [&str; 6] = [
    HAS_PROJECT,
    HAS_USER,
    HAS_SCHEMA_CONTAINER_ITEM,
    HAS_TAG_FAMILY,
    HAS_TAG,
    HAS_NODE,
];

// ── Project ──────────────────────────────────────────────────────
pub const HAS_TAGFAMILY_ROOT: &str = "HAS_TAGFAMILY_ROOT";
pub const HAS_TAG_ROOT: &str = "HAS_TAG_ROOT";
pub const HAS_NODE_ROOT: &str = "HAS_NODE_ROOT";
pub const HAS_ROOT_NODE: &str = "HAS_ROOT_NODE";
pub const ASSIGNED_TO_PROJECT: &str = "ASSIGNED_TO_PROJECT";

// ── Schema versions ──────────────────────────────────────────────
pub const HAS_VERSION: &str = "HAS_VERSION";
pub const HAS_LATEST_VERSION: &str = "HAS_LATEST_VERSION";
pub const HAS_NEXT_VERSION: &str = "HAS_NEXT_VERSION";
pub const HAS_PARENT_CONTAINER: &str = "HAS_PARENT_CONTAINER";

// ── Content ──────────────────────────────────────────────────────
pub const HAS_PARENT_TAG_FAMILY: &str = "HAS_PARENT_TAG_FAMILY";
pub const HAS_PARENT_NODE: &str = "HAS_PARENT_NODE";
pub const HAS_SCHEMA_CONTAINER: &str = "HAS_SCHEMA_CONTAINER";
pub const HAS_SCHEMA_CONTAINER_VERSION: &str = "HAS_SCHEMA_CONTAINER_VERSION";

// ── Audit ────────────────────────────────────────────────────────
pub const HAS_CREATOR: &str = "HAS_CREATOR";
pub const HAS_EDITOR: &str = "HAS_EDITOR";
