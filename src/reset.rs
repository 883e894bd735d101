// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Machine reset through the access back-end
//!
//! Rewrites every shadow scalar to its reset value in canonical order:
//! the general registers first, then the named scalars in
//! [`ScalarField::ALL`] order. Memory is untouched. Running this through the
//! recording back-end yields the `reset_uarch` access log; the verifier
//! replays the very same function.

use arbitrary_int::u5;

use crate::machine_state::registers::parse_xregister;
use crate::machine_state::shadow::ScalarField;
use crate::state_access::StateAccess;

/// Reset the machine state through `a`.
pub fn reset_state<A: StateAccess>(a: &mut A) {
    // x0 is never written; it has no backing state.
    for index in 1..32u8 {
        let reg = parse_xregister(u5::new(index));
        a.write_x(reg, 0);
    }

    for &field in ScalarField::ALL {
        a.write_field(field, field.reset_value());
    }
}
