// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::state::StateStore;
use crate::types::{IoId, PowerState};

/// Result of a feedback evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackState {
    /// The feedback style applies.
    Active,
    /// The feedback style does not apply.
    Inactive,
    /// The state is not known yet; render a neutral style.
    Loading,
}

impl FeedbackState {
    /// Returns true only for `Active`.
    #[must_use]
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl From<bool> for FeedbackState {
    fn from(active: bool) -> Self {
        if active { Self::Active } else { Self::Inactive }
    }
}

/// Active while the relay is on.
///
/// # Examples
///
/// ```
/// use ipx800_lib::projection::{FeedbackState, relay_status};
/// use ipx800_lib::state::StateStore;
/// use ipx800_lib::types::{IoId, PowerState};
///
/// let store = StateStore::new();
/// assert_eq!(relay_status(&store, IoId::new(1)), FeedbackState::Loading);
///
/// store.update(IoId::new(1), PowerState::On);
/// assert_eq!(relay_status(&store, IoId::new(1)), FeedbackState::Active);
/// ```
#[must_use]
pub fn relay_status(store: &StateStore, id: IoId) -> FeedbackState {
    relay_state_matches(store, id, PowerState::On)
}

/// Active while the relay is in the `expected` state.
#[must_use]
pub fn relay_state_matches(store: &StateStore, id: IoId, expected: PowerState) -> FeedbackState {
    store
        .get(id)
        .map_or(FeedbackState::Loading, |state| FeedbackState::from(state == expected))
}

/// One entry of the relay dropdown shown in action and feedback options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayChoice {
    /// Value sent back by the host.
    pub id: IoId,
    /// Text shown to the user.
    pub label: String,
}

/// Lists the discovered relays, in device order.
#[must_use]
pub fn relay_choices(store: &StateStore) -> Vec<RelayChoice> {
    store
        .relays()
        .into_iter()
        .map(|point| RelayChoice {
            id: point.id(),
            label: point.label().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PollSnapshot;
    use crate::types::{IoKind, IoPoint};

    #[test]
    fn unknown_state_is_loading_never_inactive() {
        let store = StateStore::new();
        let id = IoId::new(65536);
        assert_eq!(relay_status(&store, id), FeedbackState::Loading);
        assert_eq!(
            relay_state_matches(&store, id, PowerState::Off),
            FeedbackState::Loading
        );
        assert!(!FeedbackState::Loading.is_active());
    }

    #[test]
    fn state_comparison() {
        let store = StateStore::new();
        let id = IoId::new(65536);
        store.update(id, PowerState::Off);
        assert_eq!(relay_status(&store, id), FeedbackState::Inactive);
        assert_eq!(
            relay_state_matches(&store, id, PowerState::Off),
            FeedbackState::Active
        );
    }

    #[test]
    fn choices_list_relays_only() {
        let store = StateStore::new();
        store.replace_all(&PollSnapshot::success(vec![
            IoPoint::new(IoId::new(65536), IoKind::Relay, 1, "Relay Cmd 1", PowerState::Off),
            IoPoint::new(IoId::new(65600), IoKind::DigitalInput, 1, "Input 1", PowerState::On),
        ]));
        assert_eq!(
            relay_choices(&store),
            [RelayChoice {
                id: IoId::new(65536),
                label: "Relay Cmd 1 (ID: 65536)".to_string(),
            }]
        );
    }
}
