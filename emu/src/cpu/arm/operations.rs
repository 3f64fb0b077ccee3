use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluInstructionKind, AluSecondOperandInfo, ArmModeAluInstruction, Kind, ShiftOperator,
    ShiftResult, add_with_carry, rotate_immediate, shift, shift_immediate, sub_with_carry,
};
use crate::cpu::arm::instructions::{
    ArmModeInstruction, ArmModeMultiplyLongVariant, ArmModeMultiplyVariant,
    HalfwordDataTransferOffset, MsrOperand, PsrKind, SingleDataTransferOffsetInfo,
};
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::exception::Exception;
use crate::cpu::flags::{
    HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting, ReadWriteKind,
};
use crate::cpu::psr::{CONTROL_MASK, CpuState, FLAGS_MASK};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};
use crate::error::CpuErrorKind;

pub const SIZE_OF_INSTRUCTION: u32 = 4;

/// Internal cycles of a multiply, from how many significant bytes the
/// multiplier `rs` has. MUL/MLA/SMULL/SMLAL also stop early on leading ones.
pub(crate) const fn multiplier_cycles(rs: u32, signed: bool) -> u32 {
    let mut cycles = 1;
    let mut mask = 0xFFFF_FF00;
    while cycles < 4 {
        let top = rs & mask;
        if top == 0 || (signed && top == mask) {
            return cycles;
        }
        cycles += 1;
        mask <<= 8;
    }
    cycles
}

impl Arm7tdmi {
    /// LDR: a misaligned word comes back rotated.
    pub(crate) fn load_word(&mut self, address: u32) -> u32 {
        self.bus.read_word(address).rotate_right((address & 0b11) * 8)
    }

    /// LDRH: a misaligned halfword comes back rotated.
    pub(crate) fn load_half_word(&mut self, address: u32) -> u32 {
        u32::from(self.bus.read_half_word(address)).rotate_right((address & 1) * 8)
    }

    /// LDRSH: from an odd address only the addressed byte is loaded.
    pub(crate) fn load_signed_half_word(&mut self, address: u32) -> u32 {
        if address & 1 == 1 {
            self.load_signed_byte(address)
        } else {
            u32::from(self.bus.read_half_word(address)).sign_extended(16)
        }
    }

    pub(crate) fn load_signed_byte(&mut self, address: u32) -> u32 {
        u32::from(self.bus.read_byte(address)).sign_extended(8)
    }

    /// Runs an ARM instruction whose condition already passed. Returns the
    /// internal cycles it took; bus accesses are charged by the bus.
    pub fn execute_arm(&mut self, op_code: ArmModeOpcode) -> Result<u32, CpuErrorKind> {
        use ArmModeInstruction::{
            BlockDataTransfer, Branch, BranchAndExchange, CoprocessorDataOperation,
            CoprocessorDataTransfer, CoprocessorRegisterTransfer, DataProcessing,
            HalfwordDataTransfer, Mrs, Msr, Multiply, MultiplyLong, SingleDataSwap,
            SingleDataTransfer, SoftwareInterrupt, Undefined,
        };

        let cycles = match op_code.instruction {
            DataProcessing {
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
            } => self.data_processing(alu_instruction, set_conditions, rn, destination, op2),
            Mrs {
                psr_kind,
                destination,
            } => self.move_status_to_register(psr_kind, destination),
            Msr {
                psr_kind,
                field_mask,
                operand,
            } => self.move_to_status_register(psr_kind, field_mask, operand),
            Multiply {
                variant,
                should_set_codes,
                rd,
                rn,
                rs,
                rm,
            } => self.multiply(variant, should_set_codes, rd, rn, rs, rm),
            MultiplyLong {
                variant,
                should_set_codes,
                rdhi,
                rdlo,
                rs,
                rm,
            } => self.multiply_long(variant, should_set_codes, rdhi, rdlo, rs, rm),
            SingleDataSwap {
                quantity,
                base_register,
                destination,
                source,
            } => self.single_data_swap(quantity, base_register, destination, source),
            BranchAndExchange { register } => self.branch_and_exchange(register),
            HalfwordDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store,
                base_register,
                source_destination_register,
                transfer_kind,
                offset,
            } => self.half_word_data_transfer(
                indexing,
                offsetting,
                write_back,
                load_store,
                base_register,
                source_destination_register,
                transfer_kind,
                offset,
            ),
            SingleDataTransfer {
                load_store,
                quantity,
                write_back,
                indexing,
                offsetting,
                base_register,
                destination,
                offset_info,
            } => self.single_data_transfer(
                load_store,
                quantity,
                write_back,
                indexing,
                offsetting,
                base_register,
                destination,
                offset_info,
            ),
            Undefined => {
                let return_address = self
                    .registers
                    .program_counter()
                    .wrapping_add(SIZE_OF_INSTRUCTION);
                self.raise_exception(Exception::Undefined, return_address);
                0
            }
            BlockDataTransfer {
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                base_register,
                register_list,
            } => self.block_data_transfer(
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                base_register,
                register_list,
            ),
            Branch { link, offset } => self.branch(link, offset),
            SoftwareInterrupt { comment } => {
                tracing::debug!("SWI {comment:#X}");
                let return_address = self
                    .registers
                    .program_counter()
                    .wrapping_add(SIZE_OF_INSTRUCTION);
                self.raise_exception(Exception::SoftwareInterrupt, return_address);
                0
            }
            CoprocessorDataTransfer { .. } => {
                return Err(CpuErrorKind::UnsupportedInstruction("coprocessor data transfer"));
            }
            CoprocessorDataOperation { .. } => {
                return Err(CpuErrorKind::UnsupportedInstruction("coprocessor data operation"));
            }
            CoprocessorRegisterTransfer { .. } => {
                return Err(CpuErrorKind::UnsupportedInstruction(
                    "coprocessor register transfer",
                ));
            }
        };

        Ok(cycles)
    }

    pub fn data_processing(
        &mut self,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: usize,
        destination: usize,
        op2: AluSecondOperandInfo,
    ) -> u32 {
        // With a register specified shift the PC is read one cycle later,
        // so it is 12 bytes ahead instead of 8.
        let register_shift = matches!(
            op2,
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Register(_),
                ..
            }
        );
        let read = |cpu: &Self, index: usize| {
            let value = cpu.operand_register(index);
            if register_shift && index == REG_PROGRAM_COUNTER {
                value.wrapping_add(4)
            } else {
                value
            }
        };

        let op1 = read(self, rn);
        let operand = match op2 {
            AluSecondOperandInfo::Immediate { base, shift } => rotate_immediate(base, shift),
            AluSecondOperandInfo::Register {
                shift_op,
                shift_kind,
                register,
            } => {
                let rm = read(self, register);
                match shift_op {
                    ShiftOperator::Immediate(amount) => {
                        shift_immediate(shift_kind, amount, rm, self.cpsr.carry_flag())
                    }
                    ShiftOperator::Register(rs) => {
                        shift(shift_kind, self.read_register(rs) & 0xFF, rm)
                    }
                }
            }
        };

        self.alu(alu_instruction, set_conditions, destination, op1, operand);

        u32::from(register_shift)
    }

    /// Computes `op1 <alu_instruction> operand`, stores it in `destination`
    /// unless it is a test, and updates flags when `set_conditions` is set.
    ///
    /// With S set and r15 as destination the CPSR is restored from SPSR
    /// instead of updating flags; this is how exception handlers return.
    pub(crate) fn alu(
        &mut self,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        destination: usize,
        op1: u32,
        operand: ShiftResult,
    ) {
        use ArmModeAluInstruction::{
            Adc, Add, And, Bic, Cmn, Cmp, Eor, Mov, Mvn, Orr, Rsb, Rsc, Sbc, Sub, Teq, Tst,
        };

        let carry = self.cpsr.carry_flag();
        let op2 = operand.result;

        let (result, arithmetic) = match alu_instruction {
            And | Tst => (op1 & op2, None),
            Eor | Teq => (op1 ^ op2, None),
            Orr => (op1 | op2, None),
            Bic => (op1 & !op2, None),
            Mov => (op2, None),
            Mvn => (!op2, None),
            Add | Cmn => {
                let r = add_with_carry(op1, op2, false);
                (r.result, Some(r))
            }
            Adc => {
                let r = add_with_carry(op1, op2, carry);
                (r.result, Some(r))
            }
            Sub | Cmp => {
                let r = sub_with_carry(op1, op2, true);
                (r.result, Some(r))
            }
            Sbc => {
                let r = sub_with_carry(op1, op2, carry);
                (r.result, Some(r))
            }
            Rsb => {
                let r = sub_with_carry(op2, op1, true);
                (r.result, Some(r))
            }
            Rsc => {
                let r = sub_with_carry(op2, op1, carry);
                (r.result, Some(r))
            }
        };

        let writes_result = !alu_instruction.is_test();

        if set_conditions && writes_result && destination == REG_PROGRAM_COUNTER {
            self.restore_cpsr_from_spsr();
            self.write_register(REG_PROGRAM_COUNTER, result);
            return;
        }

        if set_conditions {
            match (alu_instruction.kind(), arithmetic) {
                (AluInstructionKind::Arithmetic, Some(r)) => self.cpsr.set_flags(&r),
                _ => {
                    self.cpsr.set_sign_zero(result);
                    if let Some(carry) = operand.carry {
                        self.cpsr.set_carry_flag(carry);
                    }
                }
            }
        }

        if writes_result {
            self.write_register(destination, result);
        }
    }

    fn move_status_to_register(&mut self, psr_kind: PsrKind, destination: usize) -> u32 {
        let psr = match psr_kind {
            PsrKind::Cpsr => self.cpsr,
            PsrKind::Spsr => self.spsr().unwrap_or_else(|| {
                tracing::warn!("MRS from SPSR in {} mode, reading CPSR", self.cpsr.mode());
                self.cpsr
            }),
        };
        self.write_register(destination, psr.into());
        0
    }

    fn move_to_status_register(
        &mut self,
        psr_kind: PsrKind,
        field_mask: u32,
        operand: MsrOperand,
    ) -> u32 {
        let value = match operand {
            MsrOperand::Register(rm) => self.read_register(rm),
            MsrOperand::Immediate(value) => value,
        };

        let mut mask = 0;
        if field_mask.get_bit(3) {
            mask |= FLAGS_MASK;
        }
        if field_mask.get_bit(0) {
            if self.cpsr.mode().is_privileged() {
                mask |= CONTROL_MASK;
            } else {
                tracing::warn!("ignoring MSR control field write in user mode");
            }
        }

        match psr_kind {
            PsrKind::Cpsr => {
                // The T bit is not writable through MSR.
                let updated = self.cpsr.with_masked(value, mask & !(1 << 5));
                if updated.has_valid_mode() {
                    self.cpsr = updated;
                } else {
                    tracing::debug!("ignoring invalid mode bits in MSR value {value:#010X}");
                    self.cpsr = self.cpsr.with_masked(value, mask & FLAGS_MASK);
                }
            }
            PsrKind::Spsr => match self.spsr() {
                Some(spsr) => self.set_spsr(spsr.with_masked(value, mask)),
                None => tracing::warn!("ignoring MSR to SPSR in {} mode", self.cpsr.mode()),
            },
        }

        0
    }

    pub fn multiply(
        &mut self,
        variant: ArmModeMultiplyVariant,
        should_set_codes: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    ) -> u32 {
        let multiplier = self.read_register(rs);
        let mut result = self.read_register(rm).wrapping_mul(multiplier);
        let mut cycles = multiplier_cycles(multiplier, true);

        if variant == ArmModeMultiplyVariant::Mla {
            result = result.wrapping_add(self.read_register(rn));
            cycles += 1;
        }

        self.write_register(rd, result);

        // C is meaningless after a multiply on ARMv4 and is left alone.
        if should_set_codes {
            self.cpsr.set_sign_zero(result);
        }

        cycles
    }

    pub fn multiply_long(
        &mut self,
        variant: ArmModeMultiplyLongVariant,
        should_set_codes: bool,
        rdhi: usize,
        rdlo: usize,
        rs: usize,
        rm: usize,
    ) -> u32 {
        let multiplier = self.read_register(rs);
        let multiplicand = self.read_register(rm);

        let mut result = if variant.is_signed() {
            (i64::from(multiplicand as i32) * i64::from(multiplier as i32)) as u64
        } else {
            u64::from(multiplicand) * u64::from(multiplier)
        };
        let mut cycles = multiplier_cycles(multiplier, variant.is_signed()) + 1;

        if variant.accumulates() {
            let accumulator =
                (u64::from(self.read_register(rdhi)) << 32) | u64::from(self.read_register(rdlo));
            result = result.wrapping_add(accumulator);
            cycles += 1;
        }

        self.write_register(rdlo, result as u32);
        self.write_register(rdhi, (result >> 32) as u32);

        if should_set_codes {
            self.cpsr.set_sign_flag(result.get_bit(63));
            self.cpsr.set_zero_flag(result == 0);
        }

        cycles
    }

    fn single_data_swap(
        &mut self,
        quantity: ReadWriteKind,
        base_register: usize,
        destination: usize,
        source: usize,
    ) -> u32 {
        let address = self.read_register(base_register);
        let value = self.read_register(source);

        let old = match quantity {
            ReadWriteKind::Byte => {
                let old = self.bus.read_byte(address);
                self.bus.write_byte(address, value as u8);
                u32::from(old)
            }
            ReadWriteKind::Word => {
                let old = self.load_word(address);
                self.bus.write_word(address, value);
                old
            }
        };
        self.write_register(destination, old);

        1
    }

    pub fn branch_and_exchange(&mut self, register: usize) -> u32 {
        let target = self.operand_register(register);
        let state: CpuState = target.get_bit(0).into();
        if state != self.cpsr.cpu_state() {
            tracing::trace!("switching to {state} at {target:#010X}");
        }
        self.cpsr.set_cpu_state(state);
        self.write_register(REG_PROGRAM_COUNTER, target);
        0
    }

    #[allow(clippy::too_many_arguments)]
    pub fn half_word_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        base_register: usize,
        source_destination_register: usize,
        transfer_kind: HalfwordTransferKind,
        offset: HalfwordDataTransferOffset,
    ) -> u32 {
        let offset = match offset {
            HalfwordDataTransferOffset::Immediate(offset) => offset,
            HalfwordDataTransferOffset::Register(rm) => self.read_register(rm),
        };
        let base = self.operand_register(base_register);
        let effective = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => effective,
            Indexing::Post => base,
        };

        match load_store {
            LoadStoreKind::Store => {
                // A stored PC is 12 bytes ahead.
                let mut value = self.operand_register(source_destination_register);
                if source_destination_register == REG_PROGRAM_COUNTER {
                    value = value.wrapping_add(4);
                }
                self.bus.write_half_word(address, value as u16);

                if indexing == Indexing::Post || write_back {
                    self.write_register(base_register, effective);
                }
                0
            }
            LoadStoreKind::Load => {
                let value = match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfwords => self.load_half_word(address),
                    HalfwordTransferKind::SignedByte => self.load_signed_byte(address),
                    HalfwordTransferKind::SignedHalfwords => self.load_signed_half_word(address),
                };

                // The loaded value wins over the write-back.
                if indexing == Indexing::Post || write_back {
                    self.write_register(base_register, effective);
                }
                self.write_register(source_destination_register, value);
                1
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn single_data_transfer(
        &mut self,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        offsetting: Offsetting,
        base_register: usize,
        destination: usize,
        offset_info: SingleDataTransferOffsetInfo,
    ) -> u32 {
        let amount = match offset_info {
            SingleDataTransferOffsetInfo::Immediate { offset } => offset,
            SingleDataTransferOffsetInfo::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => {
                let rm = self.read_register(reg_offset);
                shift_immediate(shift_kind, shift_amount, rm, self.cpsr.carry_flag()).result
            }
        };

        let base = self.operand_register(base_register);
        let effective = offsetting.apply(base, amount);
        let address = match indexing {
            Indexing::Pre => effective,
            Indexing::Post => base,
        };
        // Post-indexing always writes back.
        let writes_back = indexing == Indexing::Post || write_back;

        match load_store {
            LoadStoreKind::Store => {
                let mut value = self.operand_register(destination);
                if destination == REG_PROGRAM_COUNTER {
                    value = value.wrapping_add(4);
                }
                match quantity {
                    ReadWriteKind::Byte => self.bus.write_byte(address, value as u8),
                    ReadWriteKind::Word => self.bus.write_word(address, value),
                }

                if writes_back {
                    self.write_register(base_register, effective);
                }
                0
            }
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Byte => u32::from(self.bus.read_byte(address)),
                    ReadWriteKind::Word => self.load_word(address),
                };

                if writes_back {
                    self.write_register(base_register, effective);
                }
                self.write_register(destination, value);
                1
            }
        }
    }

    /// LDM/STM. The lowest register always sits at the lowest address; the
    /// registers are walked upwards for IA/IB and downwards for DA/DB.
    #[allow(clippy::too_many_arguments)]
    pub fn block_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        base_register: usize,
        register_list: u16,
    ) -> u32 {
        let base = self.read_register(base_register);

        // An empty list transfers r15 and moves the base as if all sixteen
        // registers were in it.
        let (register_list, span) = if register_list == 0 {
            (1_u16 << 15, 0x40)
        } else {
            (register_list, register_list.count_ones() * 4)
        };

        let lowest_address = match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Post) => base,
            (Offsetting::Up, Indexing::Pre) => base.wrapping_add(4),
            (Offsetting::Down, Indexing::Post) => base.wrapping_sub(span).wrapping_add(4),
            (Offsetting::Down, Indexing::Pre) => base.wrapping_sub(span),
        };
        let final_base = offsetting.apply(base, span);

        let registers: Vec<(u32, usize)> = (0..16_u8)
            .filter(|&idx| register_list.get_bit(idx))
            .enumerate()
            .map(|(rank, idx)| (lowest_address.wrapping_add(rank as u32 * 4), usize::from(idx)))
            .collect();
        let order: Vec<(u32, usize)> = match offsetting {
            Offsetting::Up => registers,
            Offsetting::Down => registers.into_iter().rev().collect(),
        };

        let loads_pc = register_list.get_bit(15);
        // S bit: transfer the user bank, unless LDM loads r15 in which case
        // SPSR is restored instead.
        let user_bank = load_psr && !(load_store == LoadStoreKind::Load && loads_pc);

        match load_store {
            LoadStoreKind::Store => {
                let first_register = register_list.trailing_zeros() as usize;
                for &(address, register) in &order {
                    let value = if register == REG_PROGRAM_COUNTER {
                        self.operand_register(REG_PROGRAM_COUNTER).wrapping_add(4)
                    } else if write_back && register == base_register && register != first_register
                    {
                        // The base was already written back by the time it is stored.
                        final_base
                    } else if user_bank {
                        self.read_user_register(register)
                    } else {
                        self.read_register(register)
                    };
                    self.bus.write_word(address, value);
                }

                if write_back {
                    self.write_register(base_register, final_base);
                }
                0
            }
            LoadStoreKind::Load => {
                let mut program_counter = None;
                for &(address, register) in &order {
                    let value = self.bus.read_word(address);
                    if register == REG_PROGRAM_COUNTER {
                        program_counter = Some(value);
                    } else if user_bank {
                        self.write_user_register(register, value);
                    } else {
                        self.write_register(register, value);
                    }
                }

                // A base loaded last keeps the loaded value.
                let base_loaded_last = order.last().is_some_and(|&(_, r)| r == base_register);
                if write_back && !base_loaded_last {
                    self.write_register(base_register, final_base);
                }

                if let Some(value) = program_counter {
                    if load_psr {
                        self.restore_cpsr_from_spsr();
                    }
                    self.write_register(REG_PROGRAM_COUNTER, value);
                }
                1
            }
        }
    }

    pub fn branch(&mut self, link: bool, offset: u32) -> u32 {
        let pc = self.registers.program_counter();
        if link {
            self.write_register(REG_LR, pc.wrapping_add(SIZE_OF_INSTRUCTION));
        }

        let target = self.operand_register(REG_PROGRAM_COUNTER).wrapping_add(offset);
        self.write_register(REG_PROGRAM_COUNTER, target);
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::cpu_modes::Mode;
    use crate::cpu::psr::Psr;
    use crate::cpu::registers::REG_SP;
    use pretty_assertions::assert_eq;

    const IWRAM: u32 = 0x0300_0000;

    fn execute(cpu: &mut Arm7tdmi, op_code: u32) -> u32 {
        let op_code = ArmModeOpcode::try_from(op_code).unwrap();
        cpu.execute_arm(op_code).unwrap()
    }

    fn system_cpu() -> Arm7tdmi {
        let mut cpu = Arm7tdmi::default();
        cpu.cpsr = Psr::from(Mode::System);
        cpu.registers.set_program_counter(0x100);
        cpu
    }

    #[test]
    fn check_adds_overflow() {
        // ADDS R0, R1, #1
        let mut cpu = system_cpu();
        cpu.write_register(1, 0x7FFF_FFFF);
        execute(&mut cpu, 0xE291_0001);

        assert_eq!(cpu.read_register(0), 0x8000_0000);
        assert!(cpu.cpsr.overflow_flag());
        assert!(!cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.zero_flag());
    }

    #[test]
    fn check_subs_borrow() {
        // SUBS R0, R1, #1
        let mut cpu = system_cpu();
        execute(&mut cpu, 0xE251_0001);

        assert_eq!(cpu.read_register(0), 0xFFFF_FFFF);
        assert!(!cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.overflow_flag());
        assert!(cpu.cpsr.sign_flag());
    }

    #[test]
    fn check_logical_carry_from_shifter() {
        // MOVS R0, R1, LSL #1
        let mut cpu = system_cpu();
        cpu.write_register(1, 0x8000_0001);
        cpu.cpsr.set_overflow_flag(true);
        execute(&mut cpu, 0xE1B0_0081);

        assert_eq!(cpu.read_register(0), 2);
        assert!(cpu.cpsr.carry_flag());
        // V is untouched by logical operations.
        assert!(cpu.cpsr.overflow_flag());
    }

    #[test]
    fn check_lsl_zero_keeps_carry() {
        // MOVS R0, R1
        let mut cpu = system_cpu();
        cpu.cpsr.set_carry_flag(true);
        cpu.write_register(1, 0);
        execute(&mut cpu, 0xE1B0_0001);

        assert!(cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.zero_flag());
    }

    #[test]
    fn check_test_instructions_keep_destination() {
        // CMP R1, #0 ; TEQ R1, R1
        let mut cpu = system_cpu();
        cpu.write_register(1, 5);
        execute(&mut cpu, 0xE351_0000);
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.zero_flag());

        execute(&mut cpu, 0xE131_0001);
        assert!(cpu.cpsr.zero_flag());
        assert_eq!(cpu.read_register(1), 5);
    }

    #[test]
    fn check_sbc_and_rsc_use_carry() {
        // SBC R0, R1, R2 ; RSC R3, R1, R2
        let mut cpu = system_cpu();
        cpu.write_register(1, 10);
        cpu.write_register(2, 3);
        cpu.cpsr.set_carry_flag(false);
        execute(&mut cpu, 0xE0C1_0002);
        assert_eq!(cpu.read_register(0), 6);

        execute(&mut cpu, 0xE0E1_3002);
        assert_eq!(cpu.read_register(3), 0xFFFF_FFF8);
    }

    #[test]
    fn check_add_pc_operand_shift_register() {
        // ADD R2, R1, R15, LSL R3
        let mut cpu = system_cpu();
        cpu.write_register(1, 10);
        cpu.write_register(3, 0);

        let cycles = execute(&mut cpu, 0xE081_231F);

        assert_eq!(cpu.read_register(2), 0x100 + 12 + 10);
        assert_eq!(cycles, 1);
    }

    #[test]
    fn check_add_pc_operand_immediate_shift() {
        // ADD R0, R15, #1
        let mut cpu = system_cpu();
        execute(&mut cpu, 0xE28F_0001);
        assert_eq!(cpu.read_register(0), 0x100 + 8 + 1);
    }

    #[test]
    fn check_subs_pc_lr_restores_cpsr() {
        // SUBS PC, LR, #4
        let mut cpu = Arm7tdmi::default();
        let mut saved = Psr::from(Mode::System);
        saved.set_cpu_state(CpuState::Thumb);
        saved.set_carry_flag(true);
        cpu.cpsr = Psr::from(Mode::Irq);
        cpu.set_spsr(saved);
        cpu.write_register(REG_LR, 0x0800_0106);

        execute(&mut cpu, 0xE25E_F004);

        assert_eq!(cpu.cpsr, saved);
        assert_eq!(cpu.registers.program_counter(), 0x0800_0102);
    }

    #[test]
    fn check_psr_transfer() {
        // MSR CPSR_f, #0xF0000000 ; MRS R0, CPSR
        let mut cpu = system_cpu();
        execute(&mut cpu, 0xE328_F20F);
        assert!(cpu.cpsr.sign_flag());
        assert!(cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.overflow_flag());

        execute(&mut cpu, 0xE10F_0000);
        assert_eq!(cpu.read_register(0), 0xF000_001F);
    }

    #[test]
    fn check_msr_mode_switch() {
        // MSR CPSR_fc, R0
        let mut cpu = system_cpu();
        cpu.write_register(0, 0x0000_00D2);
        execute(&mut cpu, 0xE129_F000);
        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
        assert!(cpu.cpsr.irq_disable());
    }

    #[test]
    fn check_msr_control_ignored_in_user_mode() {
        // MSR CPSR_fc, R0
        let mut cpu = system_cpu();
        cpu.cpsr = Psr::from(Mode::User);
        cpu.write_register(0, 0x8000_001F);
        execute(&mut cpu, 0xE129_F000);
        assert_eq!(cpu.cpsr.mode(), Mode::User);
        assert!(cpu.cpsr.sign_flag());
    }

    #[test]
    fn check_msr_keeps_state_bit() {
        // MSR CPSR_c, R0
        let mut cpu = system_cpu();
        cpu.write_register(0, 0x0000_003F);
        execute(&mut cpu, 0xE121_F000);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
    }

    #[test]
    fn check_spsr_access_ignored_in_system_mode() {
        // MSR SPSR_fc, R0 ; MRS R1, SPSR
        let mut cpu = system_cpu();
        cpu.write_register(0, 0xF000_0010);
        execute(&mut cpu, 0xE169_F000);
        assert_eq!(cpu.spsr(), None);

        execute(&mut cpu, 0xE14F_1000);
        assert_eq!(cpu.read_register(1), u32::from(cpu.cpsr));
    }

    #[test]
    fn check_muls_sets_sign_zero_only() {
        // MULS R2, R0, R1
        let mut cpu = system_cpu();
        cpu.write_register(0, (-2_i32) as u32);
        cpu.write_register(1, 3);
        cpu.cpsr.set_carry_flag(true);
        cpu.cpsr.set_overflow_flag(true);

        let cycles = execute(&mut cpu, 0xE012_0190);

        assert_eq!(cpu.read_register(2), (-6_i32) as u32);
        assert!(cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.overflow_flag());
        assert_eq!(cycles, 1);
    }

    #[test]
    fn check_mla() {
        // MLA R2, R0, R1, R3
        let mut cpu = system_cpu();
        cpu.write_register(0, 7);
        cpu.write_register(1, 0x100);
        cpu.write_register(3, 5);
        let cycles = execute(&mut cpu, 0xE022_3190);
        assert_eq!(cpu.read_register(2), 0x705);
        assert_eq!(cycles, 3);
    }

    #[test]
    fn check_smull() {
        // SMULL R2, R3, R0, R1
        let mut cpu = system_cpu();
        cpu.write_register(0, (-2_i32) as u32);
        cpu.write_register(1, 3);
        execute(&mut cpu, 0xE0C3_2190);
        assert_eq!(cpu.read_register(2), 0xFFFF_FFFA);
        assert_eq!(cpu.read_register(3), 0xFFFF_FFFF);
    }

    #[test]
    fn check_umlal() {
        // UMLAL R2, R3, R0, R1
        let mut cpu = system_cpu();
        cpu.write_register(0, 0xFFFF_FFFF);
        cpu.write_register(1, 2);
        cpu.write_register(2, 1);
        cpu.write_register(3, 0);
        execute(&mut cpu, 0xE0A3_2190);
        assert_eq!(cpu.read_register(2), 0xFFFF_FFFF);
        assert_eq!(cpu.read_register(3), 1);
    }

    #[test]
    fn check_multiplier_cycles() {
        assert_eq!(multiplier_cycles(0xFF, false), 1);
        assert_eq!(multiplier_cycles(0xFFFF_FFF0, true), 1);
        assert_eq!(multiplier_cycles(0xFFFF_FFF0, false), 4);
        assert_eq!(multiplier_cycles(0x1234, false), 2);
        assert_eq!(multiplier_cycles(0x12_3456, false), 3);
    }

    #[test]
    fn check_swap() {
        // SWP R0, R1, [R2] ; SWPB R0, R1, [R2]
        let mut cpu = system_cpu();
        cpu.bus.write_word(IWRAM, 0x1122_3344);
        cpu.write_register(1, 0xAABB_CCDD);
        cpu.write_register(2, IWRAM);

        execute(&mut cpu, 0xE102_0091);
        assert_eq!(cpu.read_register(0), 0x1122_3344);
        assert_eq!(cpu.bus.read_word(IWRAM), 0xAABB_CCDD);

        cpu.write_register(1, 0x42);
        execute(&mut cpu, 0xE142_0091);
        assert_eq!(cpu.read_register(0), 0xDD);
        assert_eq!(cpu.bus.read_word(IWRAM), 0xAABB_CC42);
    }

    #[test]
    fn check_branch_and_exchange() {
        // BX R0
        let mut cpu = system_cpu();
        cpu.write_register(0, 0x0800_0101);
        execute(&mut cpu, 0xE12F_FF10);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Thumb);
        assert_eq!(cpu.registers.program_counter(), 0x0800_0100);

        cpu.cpsr.set_cpu_state(CpuState::Arm);
        cpu.write_register(0, 0x0800_0206);
        execute(&mut cpu, 0xE12F_FF10);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert_eq!(cpu.registers.program_counter(), 0x0800_0204);
    }

    #[test]
    fn check_branch_with_link() {
        // BL 0x1FC
        let mut cpu = system_cpu();
        execute(&mut cpu, 0xEB00_007F);
        assert_eq!(cpu.read_register(REG_LR), 0x104);
        assert_eq!(cpu.registers.program_counter(), 0x108 + 0x1FC);

        // B -8 loops on itself.
        execute(&mut cpu, 0xEAFF_FFFE);
        assert_eq!(cpu.registers.program_counter(), 0x108 + 0x1FC);
    }

    #[test]
    fn check_ldr_misaligned_rotates() {
        // LDR R0, [R1]
        let mut cpu = system_cpu();
        cpu.bus.write_word(IWRAM, 0x1122_3344);
        cpu.write_register(1, IWRAM + 1);
        let cycles = execute(&mut cpu, 0xE591_0000);
        assert_eq!(cpu.read_register(0), 0x4411_2233);
        assert_eq!(cycles, 1);
    }

    #[test]
    fn check_ldrb_zero_extends() {
        // LDRB R0, [R1, #3]
        let mut cpu = system_cpu();
        cpu.bus.write_word(IWRAM, 0x8122_3344);
        cpu.write_register(1, IWRAM);
        execute(&mut cpu, 0xE5D1_0003);
        assert_eq!(cpu.read_register(0), 0x81);
    }

    #[test]
    fn check_str_pc() {
        // STR R15, [R1]
        let mut cpu = system_cpu();
        cpu.write_register(1, IWRAM);
        execute(&mut cpu, 0xE581_F000);
        assert_eq!(cpu.bus.read_word(IWRAM), 0x10C);
    }

    #[test]
    fn check_ldr_post_index_write_back() {
        // LDR R0, [R1], #4
        let mut cpu = system_cpu();
        cpu.bus.write_word(IWRAM, 0xDEAD_BEEF);
        cpu.write_register(1, IWRAM);
        execute(&mut cpu, 0xE491_0004);
        assert_eq!(cpu.read_register(0), 0xDEAD_BEEF);
        assert_eq!(cpu.read_register(1), IWRAM + 4);

        // LDR R1, [R1], #4: the loaded value wins.
        cpu.write_register(1, IWRAM);
        execute(&mut cpu, 0xE491_1004);
        assert_eq!(cpu.read_register(1), 0xDEAD_BEEF);
    }

    #[test]
    fn check_str_register_offset() {
        // STR R0, [R1, -R2, LSL #2]!
        let mut cpu = system_cpu();
        cpu.write_register(0, 0x1234_5678);
        cpu.write_register(1, IWRAM + 0x10);
        cpu.write_register(2, 2);
        execute(&mut cpu, 0xE721_0102);
        assert_eq!(cpu.bus.read_word(IWRAM + 8), 0x1234_5678);
        assert_eq!(cpu.read_register(1), IWRAM + 8);
    }

    #[test]
    fn check_halfword_loads() {
        let mut cpu = system_cpu();
        cpu.bus.write_word(IWRAM, 0x80FE_1234);
        cpu.write_register(1, IWRAM);

        // LDRH R0, [R1, #2]
        execute(&mut cpu, 0xE1D1_00B2);
        assert_eq!(cpu.read_register(0), 0x80FE);

        // LDRSB R0, [R1, #2]
        execute(&mut cpu, 0xE1D1_00D2);
        assert_eq!(cpu.read_register(0), 0xFFFF_FFFE);

        // LDRSH R0, [R1, #2]
        execute(&mut cpu, 0xE1D1_00F2);
        assert_eq!(cpu.read_register(0), 0xFFFF_80FE);
    }

    #[test]
    fn check_misaligned_halfword_loads() {
        let mut cpu = system_cpu();
        cpu.bus.write_word(IWRAM, 0x0000_8034);
        cpu.write_register(1, IWRAM + 1);

        // LDRSH R0, [R1] from an odd address sign-extends the byte.
        execute(&mut cpu, 0xE1D1_00F0);
        assert_eq!(cpu.read_register(0), 0xFFFF_FF80);

        // LDRH R0, [R1] rotates the aligned halfword.
        execute(&mut cpu, 0xE1D1_00B0);
        assert_eq!(cpu.read_register(0), 0x3400_0080);
    }

    #[test]
    fn check_strh_pre_index_write_back() {
        // STRH R0, [R1, #-2]!
        let mut cpu = system_cpu();
        cpu.write_register(0, 0xABCD_1234);
        cpu.write_register(1, IWRAM + 4);
        execute(&mut cpu, 0xE161_00B2);
        assert_eq!(cpu.bus.read_half_word(IWRAM + 2), 0x1234);
        assert_eq!(cpu.read_register(1), IWRAM + 2);
    }

    #[test]
    fn check_stmdb_push() {
        // STMDB R13!, {R0-R3, R12, R14}
        let mut cpu = system_cpu();
        for (register, value) in [(0, 10), (1, 11), (2, 12), (3, 13), (12, 22), (14, 24)] {
            cpu.write_register(register, value);
        }
        cpu.write_register(REG_SP, IWRAM + 0x100);

        execute(&mut cpu, 0xE92D_500F);

        assert_eq!(cpu.read_register(REG_SP), IWRAM + 0xE8);
        let stored: Vec<u32> = (0..6).map(|i| cpu.bus.read_word(IWRAM + 0xE8 + i * 4)).collect();
        assert_eq!(stored, vec![10, 11, 12, 13, 22, 24]);
    }

    #[test]
    fn check_ldm_write_back_with_base_in_list() {
        // LDMDB R13!, {R0, R13}
        let mut cpu = system_cpu();
        cpu.bus.write_word(IWRAM + 8, 0xAAAA_AAAA);
        cpu.bus.write_word(IWRAM + 0xC, 0xBBBB_BBBB);
        cpu.write_register(REG_SP, IWRAM + 0x10);

        execute(&mut cpu, 0xE93D_2001);

        // Down transfers walk the list from r13 to r0, so r0 is loaded last
        // and r13 takes the fully computed base.
        assert_eq!(cpu.read_register(0), 0xAAAA_AAAA);
        assert_eq!(cpu.read_register(REG_SP), IWRAM + 8);
    }

    #[test]
    fn check_ldmia_base_loaded_last_keeps_loaded_value() {
        // LDMIA R13!, {R0, R13}
        let mut cpu = system_cpu();
        cpu.bus.write_word(IWRAM, 0xAAAA_AAAA);
        cpu.bus.write_word(IWRAM + 4, 0xBBBB_BBBB);
        cpu.write_register(REG_SP, IWRAM);

        execute(&mut cpu, 0xE8BD_2001);

        assert_eq!(cpu.read_register(0), 0xAAAA_AAAA);
        assert_eq!(cpu.read_register(REG_SP), 0xBBBB_BBBB);
    }

    #[test]
    fn check_ldm_base_loaded_last_wins() {
        // LDMIA R1!, {R0, R1}
        let mut cpu = system_cpu();
        cpu.bus.write_word(IWRAM, 1);
        cpu.bus.write_word(IWRAM + 4, 2);
        cpu.write_register(1, IWRAM);

        execute(&mut cpu, 0xE8B1_0003);

        assert_eq!(cpu.read_register(0), 1);
        assert_eq!(cpu.read_register(1), 2);
    }

    #[test]
    fn check_stm_base_in_list() {
        // STMIA R0!, {R0, R1}: base first, original value stored.
        let mut cpu = system_cpu();
        cpu.write_register(0, IWRAM);
        cpu.write_register(1, 7);
        execute(&mut cpu, 0xE8A0_0003);
        assert_eq!(cpu.bus.read_word(IWRAM), IWRAM);
        assert_eq!(cpu.read_register(0), IWRAM + 8);

        // STMIA R1!, {R0, R1}: base not first, written-back value stored.
        cpu.write_register(0, 7);
        cpu.write_register(1, IWRAM + 0x20);
        execute(&mut cpu, 0xE8A1_0003);
        assert_eq!(cpu.bus.read_word(IWRAM + 0x24), IWRAM + 0x28);
    }

    #[test]
    fn check_ldm_empty_list() {
        // LDMIA R0!, {}
        let mut cpu = system_cpu();
        cpu.bus.write_word(IWRAM, 0x0800_0000);
        cpu.write_register(0, IWRAM);
        execute(&mut cpu, 0xE8B0_0000);
        assert_eq!(cpu.registers.program_counter(), 0x0800_0000);
        assert_eq!(cpu.read_register(0), IWRAM + 0x40);
    }

    #[test]
    fn check_ldm_pc_with_s_bit_restores_cpsr() {
        // LDMIA R13!, {R15}^
        let mut cpu = Arm7tdmi::default();
        let mut saved = Psr::from(Mode::System);
        saved.set_cpu_state(CpuState::Thumb);
        cpu.cpsr = Psr::from(Mode::Irq);
        cpu.set_spsr(saved);
        cpu.bus.write_word(IWRAM, 0x0800_0103);
        cpu.write_register(REG_SP, IWRAM);

        execute(&mut cpu, 0xE8FD_8000);

        assert_eq!(cpu.cpsr, saved);
        assert_eq!(cpu.registers.program_counter(), 0x0800_0102);
        // Write-back happened in the IRQ bank.
        assert_eq!(cpu.registers.register_at(REG_SP, Mode::Irq.bank()), IWRAM + 4);
    }

    #[test]
    fn check_stm_user_bank() {
        // STMIA R0, {R13}^
        let mut cpu = Arm7tdmi::default();
        cpu.cpsr = Psr::from(Mode::Irq);
        cpu.write_register(REG_SP, 1);
        cpu.registers.set_register_at(REG_SP, 2, Mode::User.bank());
        cpu.write_register(0, IWRAM);

        execute(&mut cpu, 0xE8C0_2000);

        assert_eq!(cpu.bus.read_word(IWRAM), 2);
    }

    #[test]
    fn check_swi_enters_supervisor() {
        // SWI 0x5
        let mut cpu = system_cpu();
        execute(&mut cpu, 0xEF00_0005);
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(cpu.registers.program_counter(), 0x08);
        assert_eq!(cpu.read_register(REG_LR), 0x104);
        assert_eq!(cpu.spsr(), Some(Psr::from(Mode::System)));
    }

    #[test]
    fn check_swi_return_address_wraps() {
        let mut cpu = system_cpu();
        cpu.registers.set_program_counter(0xFFFF_FFFC);
        execute(&mut cpu, 0xEF00_0000);
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(cpu.read_register(REG_LR), 0);
    }

    #[test]
    fn check_undefined_enters_undefined_mode() {
        let mut cpu = system_cpu();
        execute(&mut cpu, 0xE600_0010);
        assert_eq!(cpu.cpsr.mode(), Mode::Undefined);
        assert_eq!(cpu.registers.program_counter(), 0x04);
        assert_eq!(cpu.read_register(REG_LR), 0x104);
    }

    #[test]
    fn check_coprocessor_is_unsupported() {
        let mut cpu = system_cpu();
        let op_code = ArmModeOpcode::try_from(0xEE00_0000).unwrap();
        assert!(matches!(
            cpu.execute_arm(op_code),
            Err(CpuErrorKind::UnsupportedInstruction(_))
        ));
    }
}
