#[derive(Debug, Clone)]
pub(crate) struct PoolConfig {
    /// pool name, shows up in logs
    pub name: &'static str,
    /// connection pool size
    pub size: usize,
    /// connection string
    pub conn_str: String,
}
