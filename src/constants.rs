use std::time::Duration;

pub const GCP_METADATA_URL_BASE: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance";
pub const GCP_METADATA_PATH_ID: &str = "id";
pub const GCP_METADATA_PATH_NET: &str = "network-interfaces/";
pub const GCP_METADATA_HEADER: &str = "Metadata-Flavor: Google";

pub const HTTP_TIMEOUT: Duration = Duration::from_millis(3000);
pub const HTTP_RATE_LIMIT: Duration = Duration::from_millis(1000);
pub const HTTP_POLL_TIMEOUT: Duration = Duration::from_millis(10000);
pub const HTTP_REQ_MAX_DATA: usize = 512 * 1024;
pub const HTTP_DETECT_POLL_TIMEOUT: Duration = Duration::from_millis(7000);
pub const HTTP_DETECT_MAX_DATA: usize = 256 * 1024;

pub const ROUTE_METRIC_FORWARDED_IP: u32 = 100;

pub const ENV_GCP_ENABLED: &str = "CLOUD_SETUP_GCP";
pub const ENV_LOG_LEVEL: &str = "CLOUD_SETUP_LOG_LEVEL";
pub const ENV_METADATA_URL: &str = "CLOUD_SETUP_METADATA_URL";

pub const FILE_CONFIG: &str = "/etc/cloud-setup/config.json";
