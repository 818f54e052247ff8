use super::test_helpers::*;
use super::*;

use crate::asm;
use crate::opcodes::encode;

macro_rules! register {
    ($name:ident, $reg:expr, $value:expr, $text:expr) => {
        #[test]
        fn $name() {
            let (cpu, _) = run_program($text);
            assert_eq!(cpu.r[$reg], $value, "\n{}", $text);
        }
    };
}

// These test one instruction each, in the smallest program that can show
// the result. For instance this command runs a single one:
//
// `cargo test cpu_16::test::test_add`

register!(test_ldi, 0, 0x1234, "ldi r0, 0x1234\nhalt");
register!(test_lea_is_ldi, 0, 0x0100, "lea r0, 0x0100\nhalt");
register!(test_mov, 1, 7, "ldi r0, 7\nmov r1, r0\nhalt");
register!(test_add, 0, 12, "ldi r0, 5\nldi r1, 7\nadd r0, r1\nhalt");
register!(test_sub, 0, 3, "ldi r0, 10\nldi r1, 7\nsub r0, r1\nhalt");
register!(
    test_sub_wraps,
    0,
    0xFFFF,
    "ldi r0, 0\nldi r1, 1\nsub r0, r1\nhalt"
);
#[test]
fn test_logic_ops() {
    let (cpu, _) = run_program(
        "
            ldi r0, 0x00FF
            ldi r1, 0x0F0F
            and r0, r1
            ldi r2, 0x00FF
            or r2, r1
            ldi r3, 0x00FF
            xor r3, r1
            ldi r4, 0x00FF
            not r4
            halt
        ",
    );
    assert_eq!(cpu.r[0], 0x000F);
    assert_eq!(cpu.r[2], 0x0FFF);
    assert_eq!(cpu.r[3], 0x0FF0);
    assert_eq!(cpu.r[4], 0xFF00);
}

register!(test_shl, 0, 16, "ldi r0, 1\nldi r1, 4\nshl r0, r1\nhalt");
register!(test_shr, 0, 2, "ldi r0, 16\nldi r1, 3\nshr r0, r1\nhalt");
register!(
    test_mul,
    0,
    (90000u32 & 0xFFFF) as u16,
    "ldi r0, 300\nldi r1, 300\nmul r0, r1\nhalt"
);
register!(test_addi, 0, 10, "ldi r0, 7\naddi r0, 3\nhalt");
register!(test_subi, 0, 4, "ldi r0, 7\nsubi r0, 3\nhalt");

#[test]
fn add_sets_carry_and_zero_on_wraparound() {
    let (cpu, _) = run_program("ldi r0, 0xFFFF\nldi r1, 1\nadd r0, r1\nhalt");
    assert!(cpu.flags.c);
    assert!(cpu.flags.z);
    assert!(!cpu.flags.n);
    assert!(!cpu.flags.v);
}

#[test]
fn add_sets_overflow_and_negative_at_the_sign_boundary() {
    let (cpu, _) = run_program("ldi r0, 0x7FFF\nldi r1, 1\nadd r0, r1\nhalt");
    assert!(cpu.flags.v);
    assert!(cpu.flags.n);
    assert!(!cpu.flags.c);
    assert!(!cpu.flags.z);
}

#[test]
fn cmp_sets_flags_but_leaves_registers_alone() {
    let (cpu, _) = run_program("ldi r0, 3\nldi r1, 5\ncmp r0, r1\nhalt");
    assert_eq!(cpu.r[0], 3);
    assert_eq!(cpu.r[1], 5);
    assert!(cpu.flags.c, "3 - 5 borrows");
    assert!(cpu.flags.n);
    assert!(!cpu.flags.z);

    let (cpu, _) = run_program("ldi r0, 5\nldi r1, 5\ncmp r0, r1\nhalt");
    assert!(cpu.flags.z);
}

#[test]
fn shift_by_zero_preserves_carry() {
    let (cpu, _) = run_program(
        "
            ldi r0, 0xFFFF
            ldi r1, 1
            add r0, r1      ; sets C
            ldi r2, 0
            shl r0, r2      ; amount 0: value and C unchanged
            halt
        ",
    );
    assert!(cpu.flags.c);
    assert_eq!(cpu.r[0], 0);
}

#[test]
fn mov_and_pop_update_zero_and_negative() {
    let (cpu, _) = run_program("ldi r0, 0\nldi r1, 5\nmov r1, r0\nhalt");
    assert!(cpu.flags.z);

    let (cpu, _) = run_program("ldi r0, 0x8000\npush r0\nldi r0, 0\npop r2\nhalt");
    assert_eq!(cpu.r[2], 0x8000);
    assert!(cpu.flags.n, "the popped value drives N");
    assert!(!cpu.flags.z);
}

#[test]
fn memory_write_then_read_yields_the_value() {
    let (cpu, _) = run_program("ldi r0, 0xBEEF\nst r0, [0x0100]\nld r1, [0x0100]\nhalt");
    assert_eq!(cpu.r[1], 0xBEEF);
    assert_eq!(cpu.bus.peek(0x0100), 0xBEEF);
}

#[test]
fn indirect_load_and_store() {
    let (cpu, _) = run_program(
        "
            ldi r0, 0xCAFE
            ldi r1, 0x0200
            st r0, [r1]
            ld r2, [r1]
            halt
        ",
    );
    assert_eq!(cpu.r[2], 0xCAFE);
    assert_eq!(cpu.bus.peek(0x0200), 0xCAFE);
}

#[test]
fn push_decrements_before_writing() {
    let (cpu, _) = run_program("ldi r0, 7\npush r0\nhalt");
    assert_eq!(cpu.r[SP], RESET_SP - 1);
    assert_eq!(cpu.bus.peek(RESET_SP - 1), 7);
}

#[test]
fn push_then_pop_leaves_register_and_sp_unchanged() {
    let (cpu, _) = run_program("ldi r0, 42\npush r0\npop r0\nhalt");
    assert_eq!(cpu.r[0], 42);
    assert_eq!(cpu.r[SP], RESET_SP);
}

#[test]
fn call_returns_to_the_following_instruction() {
    let (cpu, _) = run_program(
        "
            jmp main
            routine:
            ldi r1, 9
            ret
            main:
            call routine
            ldi r2, 2
            halt
        ",
    );
    assert_eq!(cpu.r[1], 9, "the routine ran");
    assert_eq!(cpu.r[2], 2, "ret landed after the call");
    assert_eq!(cpu.r[SP], RESET_SP);
}

#[test]
fn conditional_jumps_follow_the_flags() {
    let (cpu, _) = run_program(
        "
            ldi r0, 1
            ldi r1, 1
            cmp r0, r1
            jz taken
            ldi r2, 1
            halt
            taken:
            ldi r2, 2
            halt
        ",
    );
    assert_eq!(cpu.r[2], 2);

    let (cpu, _) = run_program(
        "
            ldi r0, 0
            ldi r1, 1
            sub r0, r1      ; borrows, result negative
            jc borrowed
            ldi r2, 1
            halt
            borrowed:
            jn negative
            ldi r2, 2
            halt
            negative:
            ldi r2, 3
            halt
        ",
    );
    assert_eq!(cpu.r[2], 3, "both C and N were set");
}

#[test]
fn pc_advances_by_the_instruction_word_length() {
    let (mut cpu, _) = captured_cpu();
    cpu.load(
        &[
            encode(OpCode::NOP, 0, 0),
            encode(OpCode::LDI, 0, 0),
            5,
            encode(OpCode::ADD, 0, 1),
        ],
        0,
    );
    cpu.tick();
    assert_eq!(cpu.pc, 1, "one-word instruction");
    cpu.tick();
    assert_eq!(cpu.pc, 3, "two-word instruction");
    cpu.tick();
    assert_eq!(cpu.pc, 4);
}

#[test]
fn cycles_increase_monotonically() {
    let (mut cpu, _) = captured_cpu();
    let image = asm::assemble("ldi r0, 1\nst r0, [0x0100]\nld r1, [0x0100]\nnop\nhalt")
        .unwrap();
    cpu.load(image.words(), 0);
    let mut last = cpu.cycles;
    for _ in 0..5 {
        cpu.tick();
        assert!(cpu.cycles > last, "every instruction costs cycles");
        last = cpu.cycles;
    }
}

#[test]
fn unknown_opcode_halts_with_the_pc_on_the_fault() {
    let (mut cpu, _) = captured_cpu();
    // 0x1E is not in the opcode table.
    cpu.load(&[encode(OpCode::NOP, 0, 0), 0xF000], 0);
    cpu.run();
    assert!(cpu.halted);
    assert_eq!(cpu.pc, 1, "the PC points at the faulting word");
    assert!(cpu.error.as_ref().unwrap().contains("undecodable opcode"));
}

#[test]
fn run_until_stops_at_the_predicate() {
    let (mut cpu, _) = captured_cpu();
    let image = asm::assemble("ldi r0, 1\nldi r1, 2\nldi r2, 3\nhalt").unwrap();
    cpu.load(image.words(), 0);
    cpu.run_until(|cpu| cpu.r[1] == 2);
    assert_eq!(cpu.r[1], 2);
    assert_eq!(cpu.r[2], 0, "the third instruction has not run yet");
    assert!(!cpu.halted);
}

#[test]
fn reset_restores_the_power_on_state_but_keeps_memory() {
    let (mut cpu, _) = run_program("ldi r0, 5\nst r0, [0x0300]\nhalt");
    cpu.reset();
    assert_eq!(cpu.pc, 0);
    assert_eq!(cpu.r, [0, 0, 0, 0, 0, 0, 0, RESET_SP]);
    assert!(!cpu.halted);
    assert_eq!(cpu.cycles, 0);
    assert_eq!(cpu.bus.peek(0x0300), 5, "memory survives a reset");
}

#[test]
fn scenario_hello_string_print() {
    assert_output(
        "
            jmp start
            msg:
            .asciiz \"Hi\"
            start:
            ldi r0, msg
            st r0, [0xFF10]
            halt
        ",
        "Hi",
    );
}

#[test]
fn scenario_integer_print() {
    assert_output("ldi r0, 720\nst r0, [0xFF12]\nhalt", "720\n");
}

#[test]
fn device_output_is_emitted_in_program_order() {
    assert_output(
        "
            jmp start
            msg:
            .asciiz \"S\"
            start:
            ldi r0, 'A'
            st r0, [0xFF00]
            ldi r0, msg
            st r0, [0xFF10]
            ldi r0, 7
            st r0, [0xFF12]
            halt
        ",
        "AS7\n",
    );
}

#[test]
fn scenario_recursive_factorial() {
    let cpu = assert_output(
        "
            jmp main

            ; fact(r0) -> r0, clobbers r1
            fact:
            ldi r1, 1
            cmp r0, r1
            jz fact_done
            push r0
            subi r0, 1
            call fact
            pop r1
            mul r0, r1
            fact_done:
            ret

            main:
            ldi r0, 5
            call fact
            st r0, [0xFF12]
            halt
        ",
        "120\n",
    );
    assert_eq!(cpu.r[SP], RESET_SP, "the stack unwinds completely");
}

const FIB: &str = "
    ; fib(r0) -> r0 for r0 >= 1, clobbers r1
    fib:
    ldi r1, 2
    cmp r0, r1
    jc fib_base     ; r0 < 2
    jz fib_base     ; r0 == 2
    push r0
    subi r0, 1
    call fib
    pop r1
    push r0
    mov r0, r1
    subi r0, 2
    call fib
    pop r1
    add r0, r1
    ret
    fib_base:
    ldi r0, 1
    ret
";

#[test]
fn scenario_recursive_fibonacci() {
    let text = format!(
        "
            jmp main
            {}
            main:
            ldi r0, 8
            call fib
            st r0, [0xFF12]
            halt
        ",
        FIB
    );
    assert_output(&text, "21\n");
}

#[test]
fn scenario_fibonacci_sequence() {
    let text = format!(
        "
            jmp main
            {}
            main:
            ldi r2, 1
            next:
            mov r0, r2
            call fib
            st r0, [0xFF12]
            addi r2, 1
            ldi r3, 11
            cmp r2, r3
            jc next
            halt
        ",
        FIB
    );
    assert_output(&text, "1\n1\n2\n3\n5\n8\n13\n21\n34\n55\n");
}

#[test]
fn scenario_timer_advances_across_reads() {
    let (cpu, _) = run_program(
        "
            ldi r3, 0x0100
            ldi r4, 16
            sample:
            ld r1, [0xFF20]
            st r1, [r3]
            addi r3, 1
            subi r4, 1
            jnz sample
            halt
        ",
    );
    let samples: Vec<u16> = (0u16..16).map(|i| cpu.bus.peek(0x0100 + i)).collect();
    assert!(
        samples.windows(2).any(|pair| pair[0] != pair[1]),
        "successive timer reads should differ somewhere: {:?}",
        samples
    );
}
