/// An immutable value relayed between nodes.
///
/// Routing never inspects `key` or `val`; they exist purely for the benefit
/// of whoever sent and whoever eventually reads the message. `comment` is
/// free-form and is never interpreted by this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub key: Vec<String>,
    pub val: String,
    pub comment: String,
}

impl Message {
    pub fn new(key: impl IntoIterator<Item = impl Into<String>>, val: impl Into<String>) -> Self {
        Self {
            key: key.into_iter().map(Into::into).collect(),
            val: val.into(),
            comment: String::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}
