mod topic_conf;

pub(crate) use topic_conf::{TopicConf, TopicConfResources};

// Metadata store layout
pub(crate) static BASE_TOPIC_CONF_PATH: &str = "/topics/conf";
pub(crate) static COORDINATOR_LEADER_PATH: &str = "/cluster/coordinator/leader";
