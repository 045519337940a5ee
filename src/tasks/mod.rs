pub(crate) mod sync_agent;
