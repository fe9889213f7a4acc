// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Haptic and alert feedback forwarded to the host.

/// Strength of an impact haptic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactStyle {
    Light,
    Medium,
    Heavy,
}

/// Outcome notification haptic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Error,
    Warning,
    Success,
}

/// Feedback request sent to [`crate::host::HostBridge::notify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Impact(ImpactStyle),
    Notification(NotificationKind),
}

impl Feedback {
    pub const TAP: Feedback = Feedback::Impact(ImpactStyle::Medium);
    pub const ERROR: Feedback = Feedback::Notification(NotificationKind::Error);
    pub const SUCCESS: Feedback = Feedback::Notification(NotificationKind::Success);
}
