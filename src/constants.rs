pub const VALID_VERBS: [&str; 8] = [
    CREATE,
    GET,
    LIST,
    WATCH,
    UPDATE,
    PATCH,
    DELETE,
    DELETECOLLECTION,
];

pub const DEFAULT_VERBS: [&str; 4] = [LIST, CREATE, UPDATE, DELETE];

pub const ICON_TABLE: &str = "icon-table";
pub const ASCII_TABLE: &str = "ascii-table";

/// Verb and resource wildcard used both on the command line and in policy rules.
pub const ALL: &str = "*";
pub const ALL_ALIAS: &str = "all";

pub const CLUSTER_ROLE: &str = "ClusterRole";
pub const ROLE: &str = "Role";

/// Upper bound of concurrently running access reviews.
pub const MAX_INFLIGHT_REVIEWS: usize = 20;

const CREATE: &str = "create";
const GET: &str = "get";
const LIST: &str = "list";
const WATCH: &str = "watch";
const UPDATE: &str = "update";
const PATCH: &str = "patch";
const DELETE: &str = "delete";
const DELETECOLLECTION: &str = "deletecollection";
