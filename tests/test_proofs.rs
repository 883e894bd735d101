// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! End-to-end proof production and verification

use riscv_pvm::access_log::{AccessLog, AccessType};
use riscv_pvm::config::{MachineConfig, RamConfig, RomConfig, RuntimeConfig};
use riscv_pvm::machine::Machine;
use riscv_pvm::machine_state::pma::RESET_PC;
use riscv_pvm::machine_state::shadow::ScalarField;
use riscv_pvm::verifier::{
    verify_reset_uarch_log, verify_reset_uarch_state_transition,
    verify_send_cmio_response_log, verify_send_cmio_response_state_transition,
    verify_step_uarch_log, verify_step_uarch_state_transition, VerificationError,
};

fn machine_with_program(program: &[u32]) -> Machine {
    let config = MachineConfig {
        rom: RomConfig {
            image: program.iter().flat_map(|w| w.to_le_bytes()).collect(),
            image_filename: None,
        },
        ram: RamConfig {
            length: 0x1000,
            ..RamConfig::default()
        },
    };
    Machine::create(config, RuntimeConfig::default()).unwrap()
}

const NOP: u32 = 0x0000_0013;

#[test]
fn test_nop_log_shape() {
    // A NOP step touches exactly: pc (read), the instruction word (read),
    // pc (write, +4), mcycle (read), mcycle (write, +1).
    let mut machine = machine_with_program(&[NOP]);
    let log = machine.log_step_uarch().unwrap();

    let accesses = log.accesses();
    assert_eq!(accesses.len(), 5);

    assert_eq!(accesses[0].access_type, AccessType::Read);
    assert_eq!(accesses[0].address, ScalarField::Pc.address());
    assert_eq!(accesses[0].value_read, RESET_PC.to_le_bytes().to_vec());

    assert_eq!(accesses[1].access_type, AccessType::Read);
    assert_eq!(accesses[1].address, RESET_PC);
    assert_eq!(accesses[1].value_read[..4], NOP.to_le_bytes());

    assert_eq!(accesses[2].access_type, AccessType::Write);
    assert_eq!(accesses[2].address, ScalarField::Pc.address());
    assert_eq!(
        accesses[2].value_written,
        Some((RESET_PC + 4).to_le_bytes().to_vec())
    );

    assert_eq!(accesses[3].access_type, AccessType::Read);
    assert_eq!(accesses[3].address, ScalarField::Mcycle.address());
    assert_eq!(accesses[3].value_read, 0u64.to_le_bytes().to_vec());

    assert_eq!(accesses[4].access_type, AccessType::Write);
    assert_eq!(accesses[4].address, ScalarField::Mcycle.address());
    assert_eq!(accesses[4].value_written, Some(1u64.to_le_bytes().to_vec()));
}

#[test]
fn test_honest_step_log_is_accepted() {
    let mut machine = machine_with_program(&[NOP]);
    let before = machine.get_root_hash().unwrap();
    let log = machine.log_step_uarch().unwrap();
    let after = machine.get_root_hash().unwrap();

    verify_step_uarch_state_transition(&before, &log, &after).unwrap();

    let (derived_before, derived_after) = verify_step_uarch_log(&log).unwrap();
    assert_eq!(derived_before, before);
    assert_eq!(derived_after, after);
}

#[test]
fn test_flipped_instruction_word_is_rejected_at_its_entry() {
    let mut machine = machine_with_program(&[NOP]);
    let before = machine.get_root_hash().unwrap();
    let log = machine.log_step_uarch().unwrap();
    let after = machine.get_root_hash().unwrap();

    // Flip one bit of the instruction-word value (the second access).
    let mut accesses = log.accesses().to_vec();
    accesses[1].value_read[0] ^= 1;
    let tampered = rebuild_log(&log, accesses);

    let result = verify_step_uarch_state_transition(&before, &tampered, &after);
    match result {
        Err(VerificationError::ProofMismatch { index }) => assert_eq!(index, 1),
        other => panic!("expected a proof mismatch at entry 1, got {other:?}"),
    }
}

/// Rebuild a log with the same type but different accesses.
fn rebuild_log(original: &AccessLog, accesses: Vec<riscv_pvm::access_log::Access>) -> AccessLog {
    let mut log = AccessLog::new(original.log_type());
    for access in accesses {
        log.push(access);
    }
    log
}

#[test]
fn test_any_mutation_is_rejected() {
    let mut machine = machine_with_program(&[NOP]);
    let before = machine.get_root_hash().unwrap();
    let log = machine.log_step_uarch().unwrap();
    let after = machine.get_root_hash().unwrap();

    // Mutating either root is rejected.
    let bad = riscv_pvm::merkle::Digest::of(b"not the root");
    assert!(verify_step_uarch_state_transition(&bad, &log, &after).is_err());
    assert!(verify_step_uarch_state_transition(&before, &log, &bad).is_err());

    // Mutating any single byte of the serialised log makes it undecodable
    // or unverifiable.
    let bytes = log.to_bytes();
    for position in (0..bytes.len()).step_by(7) {
        let mut corrupted = bytes.clone();
        corrupted[position] ^= 0x40;
        let rejected = match AccessLog::from_bytes(&corrupted) {
            Err(_) => true,
            Ok(parsed) => {
                parsed != log
                    && verify_step_uarch_state_transition(&before, &parsed, &after).is_err()
            }
        };
        assert!(rejected, "mutation at byte {position} was not rejected");
    }
}

#[test]
fn test_reset_log_verifies() {
    let mut machine = machine_with_program(&[NOP]);
    machine.run(1);

    let before = machine.get_root_hash().unwrap();
    let log = machine.log_reset_uarch().unwrap();
    let after = machine.get_root_hash().unwrap();

    verify_reset_uarch_state_transition(&before, &log, &after).unwrap();
    let (derived_before, derived_after) = verify_reset_uarch_log(&log).unwrap();
    assert_eq!(derived_before, before);
    assert_eq!(derived_after, after);

    // After the reset the program counter is back at the reset vector.
    assert_eq!(machine.state().pc, RESET_PC);
    assert_eq!(machine.state().mcycle, 0);
}

#[test]
fn test_cmio_response_log_verifies_and_pins_data() {
    // wfi
    let mut machine = machine_with_program(&[0x1050_0073]);
    machine.run(10);

    let before = machine.get_root_hash().unwrap();
    let log = machine.log_send_cmio_response(0x0001, b"OK").unwrap();
    let after = machine.get_root_hash().unwrap();

    verify_send_cmio_response_state_transition(0x0001, b"OK", &before, &log, &after).unwrap();
    let (derived_before, derived_after) =
        verify_send_cmio_response_log(0x0001, b"OK", &log).unwrap();
    assert_eq!(derived_before, before);
    assert_eq!(derived_after, after);

    // Truncated data must be rejected.
    assert!(verify_send_cmio_response_state_transition(0x0001, b"O", &before, &log, &after)
        .is_err());
    // So must a different reason.
    assert!(verify_send_cmio_response_state_transition(0x0002, b"OK", &before, &log, &after)
        .is_err());
}

#[test]
fn test_step_log_wire_roundtrip() {
    let mut machine = machine_with_program(&[NOP]);
    let log = machine.log_step_uarch().unwrap();
    let decoded = AccessLog::from_bytes(&log.to_bytes()).unwrap();
    assert_eq!(decoded, log);
}

#[test]
fn test_log_of_wrong_kind_is_rejected() {
    let mut machine = machine_with_program(&[NOP]);
    let log = machine.log_step_uarch().unwrap();
    assert!(matches!(
        verify_reset_uarch_log(&log),
        Err(VerificationError::WrongLogType(_))
    ));
}

#[test]
fn test_proof_chain_over_several_logged_steps() {
    // addi t0, x0, 5 ; addi t1, x0, 7 ; add t2, t0, t1 ; then NOPs
    let mut machine = machine_with_program(&[0x0050_0293, 0x0070_0313, 0x0062_83B3, NOP, NOP]);

    let mut current = machine.get_root_hash().unwrap();
    for _ in 0..5 {
        let log = machine.log_step_uarch().unwrap();
        let after = machine.get_root_hash().unwrap();
        verify_step_uarch_state_transition(&current, &log, &after).unwrap();
        current = after;
    }
}
