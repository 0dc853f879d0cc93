//! Connection settings negotiation.

use crate::frame::{self, Setting, SettingId, SettingsFrame};

/// One side's advertised settings.
///
/// Every field is optional: a SETTINGS frame only carries the
/// parameters the sender wants to change, and merging an update must
/// leave absent fields untouched. The `effective_*` accessors fall
/// back to the protocol defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    pub header_table_size: Option<u32>,
    pub enable_push: Option<u32>,
    pub max_concurrent_streams: Option<u32>,
    pub initial_window_size: Option<u32>,
    pub max_frame_size: Option<u32>,
    pub max_header_list_size: Option<u32>,
}

impl Settings {
    /// Create empty settings (all protocol defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the header compression table size.
    pub fn header_table_size(mut self, value: u32) -> Self {
        self.header_table_size = Some(value);
        self
    }

    /// Enable or disable server push.
    pub fn enable_push(mut self, value: bool) -> Self {
        self.enable_push = Some(value as u32);
        self
    }

    /// Set maximum concurrent streams.
    pub fn max_concurrent_streams(mut self, value: u32) -> Self {
        self.max_concurrent_streams = Some(value);
        self
    }

    /// Set initial stream window size.
    pub fn initial_window_size(mut self, value: u32) -> Self {
        self.initial_window_size = Some(value);
        self
    }

    /// Set maximum frame size.
    pub fn max_frame_size(mut self, value: u32) -> Self {
        self.max_frame_size = Some(value);
        self
    }

    /// Set maximum header list size.
    pub fn max_header_list_size(mut self, value: u32) -> Self {
        self.max_header_list_size = Some(value);
        self
    }

    /// Build settings from a received SETTINGS frame.
    pub fn from_frame(frame: &SettingsFrame) -> Self {
        let mut settings = Self::default();
        settings.apply(frame);
        settings
    }

    /// Merge a SETTINGS frame over the current values. Only fields
    /// present in the frame are overwritten; unknown ids are ignored.
    pub fn apply(&mut self, frame: &SettingsFrame) {
        for setting in &frame.settings {
            match setting.id {
                SettingId::HeaderTableSize => self.header_table_size = Some(setting.value),
                SettingId::EnablePush => self.enable_push = Some(setting.value),
                SettingId::MaxConcurrentStreams => {
                    self.max_concurrent_streams = Some(setting.value)
                }
                SettingId::InitialWindowSize => self.initial_window_size = Some(setting.value),
                SettingId::MaxFrameSize => self.max_frame_size = Some(setting.value),
                SettingId::MaxHeaderListSize => self.max_header_list_size = Some(setting.value),
                SettingId::Unknown(_) => {}
            }
        }
    }

    /// One wire record per present field, in canonical id order.
    pub fn to_settings(&self) -> Vec<Setting> {
        let fields = [
            (SettingId::HeaderTableSize, self.header_table_size),
            (SettingId::EnablePush, self.enable_push),
            (SettingId::MaxConcurrentStreams, self.max_concurrent_streams),
            (SettingId::InitialWindowSize, self.initial_window_size),
            (SettingId::MaxFrameSize, self.max_frame_size),
            (SettingId::MaxHeaderListSize, self.max_header_list_size),
        ];

        fields
            .into_iter()
            .filter_map(|(id, value)| value.map(|value| Setting { id, value }))
            .collect()
    }

    pub fn effective_header_table_size(&self) -> u32 {
        self.header_table_size
            .unwrap_or(frame::DEFAULT_HEADER_TABLE_SIZE)
    }

    pub fn effective_enable_push(&self) -> bool {
        self.enable_push.unwrap_or(1) != 0
    }

    /// Default is no limit.
    pub fn effective_max_concurrent_streams(&self) -> u32 {
        self.max_concurrent_streams.unwrap_or(u32::MAX)
    }

    pub fn effective_initial_window_size(&self) -> u32 {
        self.initial_window_size
            .unwrap_or(frame::DEFAULT_INITIAL_WINDOW_SIZE)
    }

    pub fn effective_max_frame_size(&self) -> u32 {
        self.max_frame_size.unwrap_or(frame::DEFAULT_MAX_FRAME_SIZE)
    }

    /// Default is no limit.
    pub fn effective_max_header_list_size(&self) -> u32 {
        self.max_header_list_size.unwrap_or(u32::MAX)
    }
}
