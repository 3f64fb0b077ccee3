//! Thumb execution. Most formats are narrower encodings of an ARM
//! instruction and go through the same ALU and block transfer code.

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{ArmModeAluInstruction, ShiftResult, shift, shift_immediate};
use crate::cpu::arm::operations::multiplier_cycles;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::exception::Exception;
use crate::cpu::flags::{
    Indexing, LoadStoreKind, OperandKind, Offsetting, Operation, ReadWriteKind, ShiftKind,
};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP};
use crate::cpu::thumb::alu_instructions::{ThumbHighRegisterOperation, ThumbModeAluInstruction};
use crate::cpu::thumb::instruction::ThumbModeInstruction;
use crate::cpu::thumb::mode::ThumbModeOpcode;

pub const SIZE_OF_INSTRUCTION: u32 = 2;

/// An operand that does not go through the barrel shifter.
const fn unshifted(value: u32) -> ShiftResult {
    ShiftResult {
        result: value,
        carry: None,
    }
}

impl Arm7tdmi {
    /// Runs a Thumb instruction whose condition already passed and returns
    /// its internal cycles. Every decodable Thumb instruction can execute.
    pub fn execute_thumb(&mut self, op_code: ThumbModeOpcode) -> u32 {
        use ThumbModeInstruction::{
            AddOffsetSP, AddSubtract, AluOp, CondBranch, HiRegisterOpBX, LoadAddress,
            LoadStoreHalfword, LoadStoreImmOffset, LoadStoreRegisterOffset,
            LoadStoreSignExtByteHalfword, LongBranchLink, MoveCompareAddSubtractImm,
            MoveShiftedRegister, MultipleLoadStore, PCRelativeLoad, PushPopReg,
            SPRelativeLoadStore, Swi, UncondBranch,
        };

        match op_code.instruction {
            MoveShiftedRegister {
                shift_operation,
                offset5,
                source_register,
                destination_register,
            } => self.move_shifted_reg(
                shift_operation,
                offset5,
                source_register,
                destination_register,
            ),
            AddSubtract {
                operation_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            } => self.add_subtract(
                operation_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            ),
            MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => self.move_compare_add_sub_imm(operation, destination_register, offset),
            AluOp {
                alu_operation,
                source_register,
                destination_register,
            } => self.alu_op(alu_operation, source_register, destination_register),
            HiRegisterOpBX {
                register_operation,
                source_register,
                destination_register,
            } => self.hi_reg_operation_branch_ex(
                register_operation,
                source_register,
                destination_register,
            ),
            PCRelativeLoad {
                destination_register,
                immediate_value,
            } => self.pc_relative_load(destination_register, immediate_value),
            LoadStoreRegisterOffset {
                load_store,
                byte_word,
                ro,
                base_register,
                destination_register,
            } => {
                let address = self
                    .read_register(base_register)
                    .wrapping_add(self.read_register(ro));
                self.load_store(load_store, byte_word, address, destination_register)
            }
            LoadStoreSignExtByteHalfword {
                h,
                sign_extend_flag,
                offset_register,
                base_register,
                destination_register,
            } => self.load_store_sign_extend_byte_halfword(
                h,
                sign_extend_flag,
                offset_register,
                base_register,
                destination_register,
            ),
            LoadStoreImmOffset {
                load_store,
                byte_word,
                offset,
                base_register,
                destination_register,
            } => {
                let address = self.read_register(base_register).wrapping_add(offset);
                self.load_store(load_store, byte_word, address, destination_register)
            }
            LoadStoreHalfword {
                load_store,
                offset,
                base_register,
                source_destination_register,
            } => self.load_store_halfword(
                load_store,
                offset,
                base_register,
                source_destination_register,
            ),
            SPRelativeLoadStore {
                load_store,
                destination_register,
                word8,
            } => {
                let address = self.read_register(REG_SP).wrapping_add(word8);
                self.load_store(
                    load_store,
                    ReadWriteKind::Word,
                    address,
                    destination_register,
                )
            }
            LoadAddress {
                sp,
                destination_register,
                offset,
            } => self.load_address(sp, destination_register, offset),
            AddOffsetSP { s, word7 } => self.add_offset_sp(s, word7),
            PushPopReg {
                load_store,
                pc_lr,
                register_list,
            } => self.push_pop_register(load_store, pc_lr, register_list),
            MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => self.block_data_transfer(
                Indexing::Post,
                Offsetting::Up,
                false,
                true,
                load_store,
                base_register,
                register_list,
            ),
            CondBranch {
                immediate_offset, ..
            } => self.relative_branch(immediate_offset),
            UncondBranch { offset } => self.relative_branch(offset),
            LongBranchLink { h, offset } => self.long_branch_link(h, offset),
            Swi { comment } => {
                tracing::debug!("SWI {comment:#X}");
                let return_address = self
                    .registers
                    .program_counter()
                    .wrapping_add(SIZE_OF_INSTRUCTION);
                self.raise_exception(Exception::SoftwareInterrupt, return_address);
                0
            }
        }
    }

    pub fn move_shifted_reg(&mut self, op: ShiftKind, offset5: u32, rs: usize, rd: usize) -> u32 {
        let source = self.read_register(rs);
        let shifted = shift_immediate(op, offset5, source, self.cpsr.carry_flag());
        self.alu(ArmModeAluInstruction::Mov, true, rd, 0, shifted);
        0
    }

    pub fn add_subtract(
        &mut self,
        operation_kind: OperandKind,
        subtract: bool,
        rn_offset3: u32,
        rs: usize,
        rd: usize,
    ) -> u32 {
        let offset = match operation_kind {
            OperandKind::Immediate => rn_offset3,
            OperandKind::Register => self.read_register(rn_offset3 as usize),
        };
        let alu_instruction = if subtract {
            ArmModeAluInstruction::Sub
        } else {
            ArmModeAluInstruction::Add
        };

        let rs = self.read_register(rs);
        self.alu(alu_instruction, true, rd, rs, unshifted(offset));
        0
    }

    pub fn move_compare_add_sub_imm(&mut self, op: Operation, rd: usize, offset: u32) -> u32 {
        let alu_instruction = match op {
            Operation::Mov => ArmModeAluInstruction::Mov,
            Operation::Cmp => ArmModeAluInstruction::Cmp,
            Operation::Add => ArmModeAluInstruction::Add,
            Operation::Sub => ArmModeAluInstruction::Sub,
        };

        let rd_value = self.read_register(rd);
        self.alu(alu_instruction, true, rd, rd_value, unshifted(offset));
        0
    }

    pub fn alu_op(&mut self, op: ThumbModeAluInstruction, rs: usize, rd: usize) -> u32 {
        let rd_value = self.read_register(rd);
        let rs_value = self.read_register(rs);

        let shift_kind = match op {
            ThumbModeAluInstruction::Lsl => Some(ShiftKind::Lsl),
            ThumbModeAluInstruction::Lsr => Some(ShiftKind::Lsr),
            ThumbModeAluInstruction::Asr => Some(ShiftKind::Asr),
            ThumbModeAluInstruction::Ror => Some(ShiftKind::Ror),
            _ => None,
        };
        if let Some(kind) = shift_kind {
            let shifted = shift(kind, rs_value & 0xFF, rd_value);
            self.alu(ArmModeAluInstruction::Mov, true, rd, 0, shifted);
            return 1;
        }

        let alu_instruction = match op {
            ThumbModeAluInstruction::Mul => {
                let result = rd_value.wrapping_mul(rs_value);
                self.write_register(rd, result);
                self.cpsr.set_sign_zero(result);
                return multiplier_cycles(rd_value, true);
            }
            ThumbModeAluInstruction::Neg => {
                self.alu(ArmModeAluInstruction::Rsb, true, rd, rs_value, unshifted(0));
                return 0;
            }
            ThumbModeAluInstruction::And => ArmModeAluInstruction::And,
            ThumbModeAluInstruction::Eor => ArmModeAluInstruction::Eor,
            ThumbModeAluInstruction::Adc => ArmModeAluInstruction::Adc,
            ThumbModeAluInstruction::Sbc => ArmModeAluInstruction::Sbc,
            ThumbModeAluInstruction::Tst => ArmModeAluInstruction::Tst,
            ThumbModeAluInstruction::Cmp => ArmModeAluInstruction::Cmp,
            ThumbModeAluInstruction::Cmn => ArmModeAluInstruction::Cmn,
            ThumbModeAluInstruction::Orr => ArmModeAluInstruction::Orr,
            ThumbModeAluInstruction::Bic => ArmModeAluInstruction::Bic,
            ThumbModeAluInstruction::Mvn
            | ThumbModeAluInstruction::Lsl
            | ThumbModeAluInstruction::Lsr
            | ThumbModeAluInstruction::Asr
            | ThumbModeAluInstruction::Ror => ArmModeAluInstruction::Mvn,
        };

        self.alu(alu_instruction, true, rd, rd_value, unshifted(rs_value));
        0
    }

    pub fn hi_reg_operation_branch_ex(
        &mut self,
        op: ThumbHighRegisterOperation,
        rs: usize,
        rd: usize,
    ) -> u32 {
        let source = self.operand_register(rs);
        match op {
            ThumbHighRegisterOperation::Add => {
                let rd_value = self.operand_register(rd);
                self.alu(ArmModeAluInstruction::Add, false, rd, rd_value, unshifted(source));
            }
            // The only format 5 operation that sets flags.
            ThumbHighRegisterOperation::Cmp => {
                let rd_value = self.operand_register(rd);
                self.alu(ArmModeAluInstruction::Cmp, true, rd, rd_value, unshifted(source));
            }
            ThumbHighRegisterOperation::Mov => {
                self.alu(ArmModeAluInstruction::Mov, false, rd, 0, unshifted(source));
            }
            ThumbHighRegisterOperation::Bx => {
                self.branch_and_exchange(rs);
            }
        }
        0
    }

    /// Bit 1 of the PC is ignored, so the base is always word aligned.
    fn word_aligned_pc(&self) -> u32 {
        self.operand_register(REG_PROGRAM_COUNTER) & !0b10
    }

    pub fn pc_relative_load(&mut self, rd: usize, immediate_value: u32) -> u32 {
        let address = self.word_aligned_pc().wrapping_add(immediate_value);
        let value = self.bus.read_word(address);
        self.write_register(rd, value);
        1
    }

    fn load_store(
        &mut self,
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        address: u32,
        rd: usize,
    ) -> u32 {
        match (load_store, byte_word) {
            (LoadStoreKind::Store, ReadWriteKind::Word) => {
                let value = self.read_register(rd);
                self.bus.write_word(address, value);
                0
            }
            (LoadStoreKind::Store, ReadWriteKind::Byte) => {
                let value = self.read_register(rd);
                self.bus.write_byte(address, value as u8);
                0
            }
            (LoadStoreKind::Load, ReadWriteKind::Word) => {
                let value = self.load_word(address);
                self.write_register(rd, value);
                1
            }
            (LoadStoreKind::Load, ReadWriteKind::Byte) => {
                let value = self.bus.read_byte(address);
                self.write_register(rd, value.into());
                1
            }
        }
    }

    pub fn load_store_sign_extend_byte_halfword(
        &mut self,
        h: bool,
        sign_extend_flag: bool,
        ro: usize,
        rb: usize,
        rd: usize,
    ) -> u32 {
        let address = self.read_register(rb).wrapping_add(self.read_register(ro));

        let value = match (sign_extend_flag, h) {
            (false, false) => {
                let value = self.read_register(rd);
                self.bus.write_half_word(address, value as u16);
                return 0;
            }
            (false, true) => self.load_half_word(address),
            (true, false) => self.load_signed_byte(address),
            (true, true) => self.load_signed_half_word(address),
        };
        self.write_register(rd, value);
        1
    }

    pub fn load_store_halfword(
        &mut self,
        load_store: LoadStoreKind,
        offset: u32,
        rb: usize,
        rd: usize,
    ) -> u32 {
        let address = self.read_register(rb).wrapping_add(offset);
        match load_store {
            LoadStoreKind::Store => {
                let value = self.read_register(rd);
                self.bus.write_half_word(address, value as u16);
                0
            }
            LoadStoreKind::Load => {
                let value = self.load_half_word(address);
                self.write_register(rd, value);
                1
            }
        }
    }

    pub fn load_address(&mut self, sp: bool, rd: usize, offset: u32) -> u32 {
        let base = if sp {
            self.read_register(REG_SP)
        } else {
            self.word_aligned_pc()
        };
        self.write_register(rd, base.wrapping_add(offset));
        0
    }

    pub fn add_offset_sp(&mut self, s: bool, word7: u32) -> u32 {
        let sp = self.read_register(REG_SP);
        let sp = if s {
            sp.wrapping_sub(word7)
        } else {
            sp.wrapping_add(word7)
        };
        self.write_register(REG_SP, sp);
        0
    }

    /// PUSH is `STMDB SP!` and POP is `LDMIA SP!`, with LR/PC appended.
    pub fn push_pop_register(
        &mut self,
        load_store: LoadStoreKind,
        pc_lr: bool,
        register_list: u16,
    ) -> u32 {
        let mut register_list = register_list;
        match load_store {
            LoadStoreKind::Store => {
                register_list.set_bit(REG_LR as u8, pc_lr);
                self.block_data_transfer(
                    Indexing::Pre,
                    Offsetting::Down,
                    false,
                    true,
                    load_store,
                    REG_SP,
                    register_list,
                )
            }
            LoadStoreKind::Load => {
                register_list.set_bit(REG_PROGRAM_COUNTER as u8, pc_lr);
                self.block_data_transfer(
                    Indexing::Post,
                    Offsetting::Up,
                    false,
                    true,
                    load_store,
                    REG_SP,
                    register_list,
                )
            }
        }
    }

    /// Formats 16 and 18, relative to the PC read ahead by 4.
    fn relative_branch(&mut self, offset: i32) -> u32 {
        let target = self
            .operand_register(REG_PROGRAM_COUNTER)
            .wrapping_add_signed(offset);
        self.write_register(REG_PROGRAM_COUNTER, target);
        0
    }

    pub fn long_branch_link(&mut self, h: bool, offset: u32) -> u32 {
        if h {
            let next = self.registers.program_counter().wrapping_add(SIZE_OF_INSTRUCTION);
            let target = self.read_register(REG_LR).wrapping_add(offset << 1);
            self.write_register(REG_LR, next | 1);
            self.write_register(REG_PROGRAM_COUNTER, target);
        } else {
            let high = offset.sign_extended(11) << 12;
            let lr = self.operand_register(REG_PROGRAM_COUNTER).wrapping_add(high);
            self.write_register(REG_LR, lr);
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::cpu_modes::Mode;
    use crate::cpu::psr::{CpuState, Psr};
    use pretty_assertions::assert_eq;

    const IWRAM: u32 = 0x0300_0000;

    fn thumb_cpu() -> Arm7tdmi {
        let mut cpu = Arm7tdmi::default();
        cpu.cpsr = Psr::from(Mode::System);
        cpu.cpsr.set_cpu_state(CpuState::Thumb);
        cpu.registers.set_program_counter(0x100);
        cpu
    }

    fn execute(cpu: &mut Arm7tdmi, op_code: u16) -> u32 {
        let op_code = ThumbModeOpcode::try_from(op_code).unwrap();
        cpu.execute_thumb(op_code)
    }

    #[test]
    fn check_move_shifted_register() {
        // LSL R0, R1, #2
        let mut cpu = thumb_cpu();
        cpu.write_register(1, 0x4000_0001);
        execute(&mut cpu, 0x0088);
        assert_eq!(cpu.read_register(0), 4);
        assert!(cpu.cpsr.carry_flag());

        // LSR R0, R1, #32
        cpu.write_register(1, 0x8000_0000);
        execute(&mut cpu, 0x0808);
        assert_eq!(cpu.read_register(0), 0);
        assert!(cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.zero_flag());
    }

    #[test]
    fn check_add_subtract() {
        // ADD R0, R1, #1
        let mut cpu = thumb_cpu();
        cpu.write_register(1, 0xFFFF_FFFF);
        execute(&mut cpu, 0x1C48);
        assert_eq!(cpu.read_register(0), 0);
        assert!(cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.zero_flag());

        // SUB R0, R1, R2
        cpu.write_register(1, 1);
        cpu.write_register(2, 2);
        execute(&mut cpu, 0x1A88);
        assert_eq!(cpu.read_register(0), 0xFFFF_FFFF);
        assert!(cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.carry_flag());
    }

    #[test]
    fn check_move_compare_add_sub_imm() {
        // MOV R0, #1 keeps C.
        let mut cpu = thumb_cpu();
        cpu.cpsr.set_carry_flag(true);
        execute(&mut cpu, 0x2001);
        assert_eq!(cpu.read_register(0), 1);
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.zero_flag());

        // CMP R0, #1
        execute(&mut cpu, 0x2801);
        assert!(cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
        assert_eq!(cpu.read_register(0), 1);
    }

    #[test]
    fn check_alu_shift_by_register() {
        // LSL R0, R1 with R1 = 32
        let mut cpu = thumb_cpu();
        cpu.write_register(0, 1);
        cpu.write_register(1, 32);
        let cycles = execute(&mut cpu, 0x4088);
        assert_eq!(cpu.read_register(0), 0);
        assert!(cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.zero_flag());
        assert_eq!(cycles, 1);

        // ROR R3, R4 with R4 = 8
        cpu.write_register(3, 0xF0);
        cpu.write_register(4, 8);
        execute(&mut cpu, 0x41E3);
        assert_eq!(cpu.read_register(3), 0xF000_0000);
        assert!(cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.sign_flag());
    }

    #[test]
    fn check_alu_neg_and_mul() {
        // NEG R0, R0
        let mut cpu = thumb_cpu();
        cpu.write_register(0, 1);
        execute(&mut cpu, 0x4240);
        assert_eq!(cpu.read_register(0), 0xFFFF_FFFF);
        assert!(!cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.sign_flag());

        // MUL R0, R4
        cpu.write_register(0, 3);
        cpu.write_register(4, 5);
        let cycles = execute(&mut cpu, 0x4360);
        assert_eq!(cpu.read_register(0), 15);
        assert!(!cpu.cpsr.sign_flag());
        assert_eq!(cycles, 1);
    }

    #[test]
    fn check_alu_logical() {
        // AND R0, R3 ; TST R6, R7 ; BIC R0, R1
        let mut cpu = thumb_cpu();
        cpu.write_register(0, 0b1100);
        cpu.write_register(3, 0b1010);
        execute(&mut cpu, 0x4018);
        assert_eq!(cpu.read_register(0), 0b1000);

        cpu.write_register(6, 0b0100);
        cpu.write_register(7, 0b0011);
        execute(&mut cpu, 0x423E);
        assert!(cpu.cpsr.zero_flag());
        assert_eq!(cpu.read_register(6), 0b0100);

        cpu.write_register(1, 0b1000);
        execute(&mut cpu, 0x4388);
        assert_eq!(cpu.read_register(0), 0);
    }

    #[test]
    fn check_hi_register_operations() {
        // ADD R1, R8
        let mut cpu = thumb_cpu();
        cpu.write_register(1, 1);
        cpu.write_register(8, 2);
        execute(&mut cpu, 0x4441);
        assert_eq!(cpu.read_register(1), 3);

        // MOV PC, LR stays in Thumb.
        cpu.write_register(REG_LR, 0x0800_0101);
        execute(&mut cpu, 0x46F7);
        assert_eq!(cpu.registers.program_counter(), 0x0800_0100);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Thumb);

        // BX LR to ARM.
        cpu.write_register(REG_LR, 0x0800_0200);
        execute(&mut cpu, 0x4770);
        assert_eq!(cpu.registers.program_counter(), 0x0800_0200);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
    }

    #[test]
    fn check_pc_relative_load() {
        // LDR R1, [PC, #0x160]
        let mut cpu = thumb_cpu();
        cpu.registers.set_program_counter(IWRAM + 2);
        cpu.bus.write_word(IWRAM + 0x164, 0xCAFE_BABE);
        let cycles = execute(&mut cpu, 0x4958);
        assert_eq!(cpu.read_register(1), 0xCAFE_BABE);
        assert_eq!(cycles, 1);
    }

    #[test]
    fn check_load_store_offsets() {
        let mut cpu = thumb_cpu();

        // STR R2, [R1, R0]
        cpu.write_register(0, 4);
        cpu.write_register(1, IWRAM);
        cpu.write_register(2, 0x1122_3344);
        execute(&mut cpu, 0x500A);
        assert_eq!(cpu.bus.read_word(IWRAM + 4), 0x1122_3344);

        // LDR R2, [R1, #8] from a misaligned base rotates.
        cpu.bus.write_word(IWRAM + 8, 0xAABB_CCDD);
        cpu.write_register(1, IWRAM + 1);
        execute(&mut cpu, 0x688A);
        assert_eq!(cpu.read_register(2), 0xDDAA_BBCC);

        // LDRB R5, [R6, #7]
        cpu.write_register(6, IWRAM + 4);
        execute(&mut cpu, 0x79F5);
        assert_eq!(cpu.read_register(5), 0xAA);
    }

    #[test]
    fn check_sign_extended_loads() {
        let mut cpu = thumb_cpu();
        cpu.bus.write_word(IWRAM, 0x8000_0080);
        cpu.write_register(1, IWRAM);

        // LDSH R0, [R1, R0]
        cpu.write_register(0, 2);
        execute(&mut cpu, 0x5E08);
        assert_eq!(cpu.read_register(0), 0xFFFF_8000);

        // LDSB R0, [R1, R0]
        cpu.write_register(0, 0);
        execute(&mut cpu, 0x5608);
        assert_eq!(cpu.read_register(0), 0xFFFF_FF80);

        // STRH R2, [R1, R0]
        cpu.write_register(0, 2);
        cpu.write_register(2, 0xABCD_1234);
        execute(&mut cpu, 0x520A);
        assert_eq!(cpu.bus.read_word(IWRAM), 0x1234_0080);
    }

    #[test]
    fn check_load_store_halfword() {
        // STRH R1, [R0, #2] ; LDRH R2, [R0, #2]
        let mut cpu = thumb_cpu();
        cpu.write_register(0, IWRAM);
        cpu.write_register(1, 0xFFFF_BEEF);
        execute(&mut cpu, 0x8041);
        assert_eq!(cpu.bus.read_word(IWRAM), 0xBEEF_0000);

        execute(&mut cpu, 0x8842);
        assert_eq!(cpu.read_register(2), 0xBEEF);
    }

    #[test]
    fn check_sp_relative_and_load_address() {
        let mut cpu = thumb_cpu();
        cpu.registers.set_program_counter(IWRAM + 2);
        cpu.write_register(REG_SP, IWRAM + 0x100);

        // STR R0, [SP, #4] ; LDR R3, [SP, #4]
        cpu.write_register(0, 0x55);
        execute(&mut cpu, 0x9001);
        execute(&mut cpu, 0x9B01);
        assert_eq!(cpu.read_register(3), 0x55);

        // ADD R0, PC, #0x10
        execute(&mut cpu, 0xA004);
        assert_eq!(cpu.read_register(0), IWRAM + 4 + 0x10);

        // ADD R1, SP, #8
        execute(&mut cpu, 0xA902);
        assert_eq!(cpu.read_register(1), IWRAM + 0x108);
    }

    #[test]
    fn check_add_offset_sp() {
        let mut cpu = thumb_cpu();
        cpu.write_register(REG_SP, 0x100);
        execute(&mut cpu, 0xB084);
        assert_eq!(cpu.read_register(REG_SP), 0xF0);
        execute(&mut cpu, 0xB004);
        assert_eq!(cpu.read_register(REG_SP), 0x100);
    }

    #[test]
    fn check_push_pop() {
        // PUSH {R0, R1, LR}
        let mut cpu = thumb_cpu();
        cpu.write_register(REG_SP, IWRAM + 0x100);
        cpu.write_register(0, 10);
        cpu.write_register(1, 11);
        cpu.write_register(REG_LR, 0x0800_0123);
        execute(&mut cpu, 0xB503);

        assert_eq!(cpu.read_register(REG_SP), IWRAM + 0xF4);
        assert_eq!(cpu.bus.read_word(IWRAM + 0xF4), 10);
        assert_eq!(cpu.bus.read_word(IWRAM + 0xF8), 11);
        assert_eq!(cpu.bus.read_word(IWRAM + 0xFC), 0x0800_0123);

        // POP {R0, R1, PC}
        cpu.write_register(0, 0);
        cpu.write_register(1, 0);
        let cycles = execute(&mut cpu, 0xBD03);
        assert_eq!(cpu.read_register(0), 10);
        assert_eq!(cpu.read_register(1), 11);
        assert_eq!(cpu.registers.program_counter(), 0x0800_0122);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Thumb);
        assert_eq!(cpu.read_register(REG_SP), IWRAM + 0x100);
        assert_eq!(cycles, 1);
    }

    #[test]
    fn check_multiple_load_store() {
        // STMIA R0!, {R1, R2}
        let mut cpu = thumb_cpu();
        cpu.write_register(0, IWRAM);
        cpu.write_register(1, 1);
        cpu.write_register(2, 2);
        execute(&mut cpu, 0xC006);
        assert_eq!(cpu.read_register(0), IWRAM + 8);

        // LDMIA R3!, {R4, R5}
        cpu.write_register(3, IWRAM);
        execute(&mut cpu, 0xCB30);
        assert_eq!(cpu.read_register(4), 1);
        assert_eq!(cpu.read_register(5), 2);
        assert_eq!(cpu.read_register(3), IWRAM + 8);
    }

    #[test]
    fn check_branches() {
        // BEQ #-4
        let mut cpu = thumb_cpu();
        execute(&mut cpu, 0xD0FE);
        assert_eq!(cpu.registers.program_counter(), 0x100);

        // B #606
        execute(&mut cpu, 0xE12F);
        assert_eq!(cpu.registers.program_counter(), 0x104 + 606);
    }

    #[test]
    fn check_conditional_branch_not_taken() {
        // BNE #-4 with Z set is skipped.
        let mut cpu = thumb_cpu();
        cpu.registers.set_program_counter(IWRAM);
        cpu.bus.write_half_word(IWRAM, 0xD1FE);
        cpu.cpsr.set_zero_flag(true);

        let cycles = cpu.step().unwrap();
        assert_eq!(cycles, 1);
        assert_eq!(cpu.registers.program_counter(), IWRAM + 2);
    }

    #[test]
    fn check_long_branch_link() {
        // BL +0x1000 from 0x100.
        let mut cpu = thumb_cpu();
        execute(&mut cpu, 0xF001);
        assert_eq!(cpu.read_register(REG_LR), 0x1104);

        cpu.registers.set_program_counter(0x102);
        execute(&mut cpu, 0xF800);
        assert_eq!(cpu.registers.program_counter(), 0x1104);
        assert_eq!(cpu.read_register(REG_LR), 0x105);

        // BL to itself, with a negative high half.
        cpu.registers.set_program_counter(0x2000);
        execute(&mut cpu, 0xF7FF);
        assert_eq!(cpu.read_register(REG_LR), 0x1004);
        cpu.registers.set_program_counter(0x2002);
        execute(&mut cpu, 0xFFFE);
        assert_eq!(cpu.registers.program_counter(), 0x2000);
        assert_eq!(cpu.read_register(REG_LR), 0x2005);
    }

    #[test]
    fn check_swi() {
        let mut cpu = thumb_cpu();
        execute(&mut cpu, 0xDF05);
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert_eq!(cpu.registers.program_counter(), 0x08);
        assert_eq!(cpu.read_register(REG_LR), 0x102);
    }

    #[test]
    fn check_long_branch_link_return_wraps() {
        // BL suffix with offset 0x10, executing at the last halfword.
        let mut cpu = thumb_cpu();
        cpu.registers.set_program_counter(0xFFFF_FFFE);
        cpu.write_register(REG_LR, IWRAM);
        execute(&mut cpu, 0xF808);
        assert_eq!(cpu.read_register(REG_LR), 1);
        assert_eq!(cpu.registers.program_counter(), IWRAM + 0x10);
    }
}
