//! One module per reconciliation step.

pub(crate) mod facts;
pub(crate) mod init;
pub(crate) mod join_token;
pub(crate) mod kubeadm_config;
pub(crate) mod networking;
pub(crate) mod nodes;
