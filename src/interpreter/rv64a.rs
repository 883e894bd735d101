// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Load-reserved / store-conditional from the RV64A extension
//!
//! The reservation is tracked in the `ilrsc` scalar: it holds the reserved
//! address, or `u64::MAX` when no reservation exists. A store-conditional
//! always clears the reservation, whether it succeeds or not.

use super::PcUpdate;
use crate::bits::sign_extend;
use crate::parser::instruction::RTypeArgs;
use crate::state_access::StateAccess;
use crate::traps::Exception;

/// `LR.W` / `LR.D`, selected by `size_log2`
pub fn run_lr<A: StateAccess>(
    a: &mut A,
    args: &RTypeArgs,
    size_log2: u8,
) -> Result<PcUpdate, Exception> {
    let addr = a.read_x(args.rs1);
    let pma = a.find_pma(addr);
    let value = a.read_memory(&pma, addr, size_log2)?;
    a.write_ilrsc(addr);

    let value = match size_log2 {
        2 => sign_extend(value, 32),
        _ => value,
    };
    a.write_x(args.rd, value);
    Ok(PcUpdate::Next)
}

/// `SC.W` / `SC.D`, selected by `size_log2`
pub fn run_sc<A: StateAccess>(
    a: &mut A,
    args: &RTypeArgs,
    size_log2: u8,
) -> Result<PcUpdate, Exception> {
    let addr = a.read_x(args.rs1);
    let reserved = a.read_ilrsc();

    if reserved == addr {
        let value = a.read_x(args.rs2);
        let pma = a.find_pma(addr);
        a.write_memory(&pma, addr, value, size_log2)?;
        a.write_ilrsc(u64::MAX);
        a.write_x(args.rd, 0);
    } else {
        a.write_ilrsc(u64::MAX);
        a.write_x(args.rd, 1);
    }
    Ok(PcUpdate::Next)
}

#[cfg(test)]
mod tests {
    use crate::interpreter::step_uarch;
    use crate::machine_state::pma::{PmaEntry, PmaFlags, PMA_PAGE_SIZE, RAM_START, ROM_START};
    use crate::machine_state::registers::{t0, t1, t2};
    use crate::machine_state::MachineState;
    use crate::state_access::DirectAccess;

    fn boot_state(program: &[u32]) -> MachineState {
        let image: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
        MachineState::new(vec![
            PmaEntry::memory(
                ROM_START,
                PMA_PAGE_SIZE,
                PmaFlags::READ.union(PmaFlags::EXECUTE),
                image,
            ),
            PmaEntry::memory(
                RAM_START,
                PMA_PAGE_SIZE,
                PmaFlags::READ.union(PmaFlags::WRITE),
                vec![],
            ),
        ])
    }

    #[test]
    fn test_lr_sc_success() {
        // lr.d t1, (t0) ; sc.d t2, t1, (t0)
        let mut state = boot_state(&[0x1002_B32F, 0x1862_B3AF]);
        state.xregisters.write(t0, RAM_START);
        {
            let mut access = DirectAccess::new(&mut state);
            step_uarch(&mut access);
            step_uarch(&mut access);
        }
        assert_eq!(state.xregisters.read(t2), 0);
        assert_eq!(state.ilrsc, u64::MAX);
    }

    #[test]
    fn test_sc_without_reservation_fails() {
        // sc.d t2, t1, (t0)
        let mut state = boot_state(&[0x1862_B3AF]);
        state.xregisters.write(t0, RAM_START);
        state.xregisters.write(t1, 0x77);
        {
            let mut access = DirectAccess::new(&mut state);
            step_uarch(&mut access);
        }
        assert_eq!(state.xregisters.read(t2), 1);
        // The store did not land.
        let (_, ram) = state.find_pma(RAM_START).unwrap();
        assert_eq!(ram.read_word(RAM_START).unwrap(), 0);
    }
}
