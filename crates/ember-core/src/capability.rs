// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Driver capability detection.

use crate::settings::RenderSettings;
use std::collections::BTreeSet;

/// Extension that allows creating and operating on objects by name.
pub const DIRECT_STATE_ACCESS: &str = "GL_ARB_direct_state_access";
/// Extension that allows immutable, persistently mappable buffer storage.
pub const BUFFER_STORAGE: &str = "GL_ARB_buffer_storage";
/// Extension that provides debug groups and object labels.
pub const KHR_DEBUG: &str = "GL_KHR_debug";
/// Extension that provides anisotropic texture filtering.
pub const ANISOTROPIC_FILTERING: &str = "GL_EXT_texture_filter_anisotropic";

/// The optional driver features detected once at device creation.
///
/// A `CapabilitySet` is a pure function of the extension list and the settings
/// it was probed with; it is never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapabilitySet {
    direct_state_access: bool,
    buffer_storage: bool,
    debug_labels: bool,
    anisotropic_filtering: bool,
    used: BTreeSet<&'static str>,
}

impl CapabilitySet {
    /// Probes the capability set from the extensions the driver reports.
    ///
    /// Unknown extensions are ignored, missing ones are unsupported. The
    /// `allow_*` toggles in `settings` force a capability off.
    pub fn probe<S: AsRef<str>>(extensions: &[S], settings: &RenderSettings) -> Self {
        let advertised: BTreeSet<&str> = extensions.iter().map(AsRef::as_ref).collect();
        let mut set = Self::default();

        if settings.allow_direct_access && advertised.contains(DIRECT_STATE_ACCESS) {
            set.direct_state_access = true;
            set.used.insert(DIRECT_STATE_ACCESS);
        }
        if settings.allow_buffer_storage && advertised.contains(BUFFER_STORAGE) {
            set.buffer_storage = true;
            set.used.insert(BUFFER_STORAGE);
        }
        if settings.debug_labels && advertised.contains(KHR_DEBUG) {
            set.debug_labels = true;
            set.used.insert(KHR_DEBUG);
        }
        if advertised.contains(ANISOTROPIC_FILTERING) {
            set.anisotropic_filtering = true;
            set.used.insert(ANISOTROPIC_FILTERING);
        }

        set
    }

    /// Objects can be created and operated on by name.
    pub fn direct_state_access(&self) -> bool {
        self.direct_state_access
    }

    /// Buffers can get immutable, persistently mapped storage.
    pub fn buffer_storage(&self) -> bool {
        self.buffer_storage
    }

    /// Debug groups and object labels reach the driver.
    pub fn debug_labels(&self) -> bool {
        self.debug_labels
    }

    /// Anisotropic filtering is available to samplers.
    pub fn anisotropic_filtering(&self) -> bool {
        self.anisotropic_filtering
    }

    /// The extension names this layer relies on, sorted.
    pub fn used_capabilities(&self) -> Vec<&'static str> {
        self.used.iter().copied().collect()
    }
}
