pub(crate) mod link;
pub(crate) mod node;
pub(crate) mod traffic;
