use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use pubhub_common::ConnectionId;

use crate::connection::Connection;

/// A registered recipient of broadcasts.
///
/// Identity is the connection id alone; `name` is informational.
#[derive(Clone)]
pub struct Subscriber {
    connection: Arc<dyn Connection>,
    name: String,
}

impl Subscriber {
    pub fn new(connection: Arc<dyn Connection>, name: impl Into<String>) -> Self {
        Self {
            connection,
            name: name.into(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_open()
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Subscriber {}

impl Hash for Subscriber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id())
            .field("name", &self.name)
            .finish()
    }
}
