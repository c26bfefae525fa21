use uuid::Uuid;

/// A configured webchat integration instance, mapping 1:1 to a channel on
/// the router side. Loaded from the datastore and cached with a bounded TTL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub id: i64,
    pub uuid: Uuid,
    pub org_id: i64,
    pub secret: Option<String>,
}

impl Channel {
    /// The shared secret used to authenticate traffic between this gateway
    /// and the router for this channel.
    #[must_use]
    pub fn secret(&self) -> &str {
        self.secret.as_deref().unwrap_or_default()
    }
}
