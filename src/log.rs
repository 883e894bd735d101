// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

#![allow(unused_imports, unused_macros, reason = "Not all events may be used")]

//! Logging facade
//!
//! Events are forwarded to `tracing` when the `log` feature is enabled and
//! compiled out entirely otherwise.

#[cfg(feature = "log")]
#[doc(hidden)]
pub(crate) mod implementation {
    pub(crate) use tracing::debug;
    pub(crate) use tracing::error;
    pub(crate) use tracing::info;
    pub(crate) use tracing::trace;
    // Rename `warn` to avoid conflict with a Rust attribute of the same name
    pub(crate) use tracing::warn as warning;
}

#[cfg(not(feature = "log"))]
#[doc(hidden)]
pub(crate) mod implementation {
    macro_rules! error {
        ($($ignore:tt)*) => {};
    }

    macro_rules! warning {
        ($($ignore:tt)*) => {};
    }

    macro_rules! info {
        ($($ignore:tt)*) => {};
    }

    macro_rules! debug {
        ($($ignore:tt)*) => {};
    }

    macro_rules! trace {
        ($($ignore:tt)*) => {};
    }

    pub(crate) use debug;
    pub(crate) use error;
    pub(crate) use info;
    pub(crate) use trace;
    pub(crate) use warning;
}

macro_rules! error {
    ($($body:tt)*) => {
        $crate::log::implementation::error!($($body)*)
    };
}

macro_rules! warning {
    ($($body:tt)*) => {
        $crate::log::implementation::warning!($($body)*)
    };
}

macro_rules! info {
    ($($body:tt)*) => {
        $crate::log::implementation::info!($($body)*)
    };
}

macro_rules! debug {
    ($($body:tt)*) => {
        $crate::log::implementation::debug!($($body)*)
    };
}

macro_rules! trace {
    ($($body:tt)*) => {
        $crate::log::implementation::trace!($($body)*)
    };
}

pub(crate) use debug;
pub(crate) use error;
pub(crate) use info;
pub(crate) use trace;
pub(crate) use warning;
