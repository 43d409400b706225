//! Shadow topic names.
//!
//! All topics hang off `$aws/things/{thing}/shadow/name/{shadow}`.

/// The channels the engine subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowChannel {
    GetAccepted,
    GetRejected,
    UpdateDelta,
    UpdateAccepted,
    UpdateRejected,
}

impl ShadowChannel {
    /// Subscription order used on connect and on every resubscription.
    pub const ALL: [ShadowChannel; 5] = [
        Self::GetAccepted,
        Self::GetRejected,
        Self::UpdateDelta,
        Self::UpdateAccepted,
        Self::UpdateRejected,
    ];
}

/// Fully expanded topic set for one named shadow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowTopics {
    pub get: String,
    pub get_accepted: String,
    pub get_rejected: String,
    pub update: String,
    pub update_delta: String,
    pub update_accepted: String,
    pub update_rejected: String,
}

impl ShadowTopics {
    pub fn new(thing_name: &str, shadow_name: &str) -> Self {
        let prefix = format!("$aws/things/{thing_name}/shadow/name/{shadow_name}");
        Self {
            get: format!("{prefix}/get"),
            get_accepted: format!("{prefix}/get/accepted"),
            get_rejected: format!("{prefix}/get/rejected"),
            update: format!("{prefix}/update"),
            update_delta: format!("{prefix}/update/delta"),
            update_accepted: format!("{prefix}/update/accepted"),
            update_rejected: format!("{prefix}/update/rejected"),
        }
    }

    pub fn topic(&self, channel: ShadowChannel) -> &str {
        match channel {
            ShadowChannel::GetAccepted => &self.get_accepted,
            ShadowChannel::GetRejected => &self.get_rejected,
            ShadowChannel::UpdateDelta => &self.update_delta,
            ShadowChannel::UpdateAccepted => &self.update_accepted,
            ShadowChannel::UpdateRejected => &self.update_rejected,
        }
    }

    /// Which channel an inbound topic belongs to.
    pub fn classify(&self, topic: &str) -> Option<ShadowChannel> {
        ShadowChannel::ALL
            .into_iter()
            .find(|c| self.topic(*c) == topic)
    }
}
