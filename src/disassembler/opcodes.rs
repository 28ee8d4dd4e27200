//! The CPython 3.7 opcode table.
//!
//! Every opcode byte the 3.7 compiler emits is a variant of [`Opcode`]. The variant names
//! serialize to the interpreter's mnemonics (`LOAD_CONST`, `POP_JUMP_IF_FALSE`, ...) and
//! [`Opcode::operand_class`] says how the operand of each one is resolved.

use strum::{Display, EnumCount, EnumIter, FromRepr, IntoStaticStr};

/// Opcodes at or above this value take an operand
pub const HAVE_ARGUMENT: u8 = 90;

/// Comparison operators indexed by the `COMPARE_OP` operand
pub const CMP_OP: [&str; 12] = [
    "<",
    "<=",
    "==",
    "!=",
    ">",
    ">=",
    "in",
    "not in",
    "is",
    "is not",
    "exception match",
    "BAD",
];

/// Conversions indexed by the low two bits of the `FORMAT_VALUE` operand
pub const FORMAT_CONVERSIONS: [&str; 4] = ["", "str", "repr", "ascii"];

/// How an instruction's operand is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandClass {
    /// The instruction has no operand
    None,
    /// Index into the constant pool
    Const,
    /// Index into the name table
    Name,
    /// Index into the local variable names
    Local,
    /// Index into cell variables followed by free variables
    Free,
    /// Byte distance from the next instruction
    JumpRelative,
    /// Byte offset from the start of the unit
    JumpAbsolute,
    /// Index into [`CMP_OP`]
    Compare,
    /// A plain number (counts, flags, conversion bits)
    Literal,
}

/// A CPython 3.7 opcode
#[allow(missing_docs)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    IntoStaticStr,
    EnumIter,
    EnumCount,
    FromRepr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Opcode {
    PopTop = 1,
    RotTwo = 2,
    RotThree = 3,
    DupTop = 4,
    DupTopTwo = 5,
    Nop = 9,
    UnaryPositive = 10,
    UnaryNegative = 11,
    UnaryNot = 12,
    UnaryInvert = 15,
    BinaryMatrixMultiply = 16,
    InplaceMatrixMultiply = 17,
    BinaryPower = 19,
    BinaryMultiply = 20,
    BinaryModulo = 22,
    BinaryAdd = 23,
    BinarySubtract = 24,
    BinarySubscr = 25,
    BinaryFloorDivide = 26,
    BinaryTrueDivide = 27,
    InplaceFloorDivide = 28,
    InplaceTrueDivide = 29,
    GetAiter = 50,
    GetAnext = 51,
    BeforeAsyncWith = 52,
    InplaceAdd = 55,
    InplaceSubtract = 56,
    InplaceMultiply = 57,
    InplaceModulo = 59,
    StoreSubscr = 60,
    DeleteSubscr = 61,
    BinaryLshift = 62,
    BinaryRshift = 63,
    BinaryAnd = 64,
    BinaryXor = 65,
    BinaryOr = 66,
    InplacePower = 67,
    GetIter = 68,
    GetYieldFromIter = 69,
    PrintExpr = 70,
    LoadBuildClass = 71,
    YieldFrom = 72,
    GetAwaitable = 73,
    InplaceLshift = 75,
    InplaceRshift = 76,
    InplaceAnd = 77,
    InplaceXor = 78,
    InplaceOr = 79,
    BreakLoop = 80,
    WithCleanupStart = 81,
    WithCleanupFinish = 82,
    ReturnValue = 83,
    ImportStar = 84,
    SetupAnnotations = 85,
    YieldValue = 86,
    PopBlock = 87,
    EndFinally = 88,
    PopExcept = 89,
    StoreName = 90,
    DeleteName = 91,
    UnpackSequence = 92,
    ForIter = 93,
    UnpackEx = 94,
    StoreAttr = 95,
    DeleteAttr = 96,
    StoreGlobal = 97,
    DeleteGlobal = 98,
    LoadConst = 100,
    LoadName = 101,
    BuildTuple = 102,
    BuildList = 103,
    BuildSet = 104,
    BuildMap = 105,
    LoadAttr = 106,
    CompareOp = 107,
    ImportName = 108,
    ImportFrom = 109,
    JumpForward = 110,
    JumpIfFalseOrPop = 111,
    JumpIfTrueOrPop = 112,
    JumpAbsolute = 113,
    PopJumpIfFalse = 114,
    PopJumpIfTrue = 115,
    LoadGlobal = 116,
    ContinueLoop = 119,
    SetupLoop = 120,
    SetupExcept = 121,
    SetupFinally = 122,
    LoadFast = 124,
    StoreFast = 125,
    DeleteFast = 126,
    RaiseVarargs = 130,
    CallFunction = 131,
    MakeFunction = 132,
    BuildSlice = 133,
    LoadClosure = 135,
    LoadDeref = 136,
    StoreDeref = 137,
    DeleteDeref = 138,
    CallFunctionKw = 141,
    CallFunctionEx = 142,
    SetupWith = 143,
    ExtendedArg = 144,
    ListAppend = 145,
    SetAdd = 146,
    MapAdd = 147,
    LoadClassderef = 148,
    BuildListUnpack = 149,
    BuildMapUnpack = 150,
    BuildMapUnpackWithCall = 151,
    BuildTupleUnpack = 152,
    BuildSetUnpack = 153,
    SetupAsyncWith = 154,
    FormatValue = 155,
    BuildConstKeyMap = 156,
    BuildString = 157,
    BuildTupleUnpackWithCall = 158,
    LoadMethod = 160,
    CallMethod = 161,
}

impl Opcode {
    /// Look up the opcode for a raw byte
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        Opcode::from_repr(byte)
    }

    /// The numeric opcode
    #[must_use]
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// The interpreter's mnemonic
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Returns true if the instruction carries an operand
    #[must_use]
    pub fn has_argument(self) -> bool {
        self.byte() >= HAVE_ARGUMENT
    }

    /// How the operand of this opcode is resolved
    #[must_use]
    pub fn operand_class(self) -> OperandClass {
        match self {
            Opcode::LoadConst => OperandClass::Const,

            Opcode::StoreName
            | Opcode::DeleteName
            | Opcode::StoreAttr
            | Opcode::DeleteAttr
            | Opcode::StoreGlobal
            | Opcode::DeleteGlobal
            | Opcode::LoadName
            | Opcode::LoadAttr
            | Opcode::ImportName
            | Opcode::ImportFrom
            | Opcode::LoadGlobal
            | Opcode::LoadMethod => OperandClass::Name,

            Opcode::LoadFast | Opcode::StoreFast | Opcode::DeleteFast => OperandClass::Local,

            Opcode::LoadClosure
            | Opcode::LoadDeref
            | Opcode::StoreDeref
            | Opcode::DeleteDeref
            | Opcode::LoadClassderef => OperandClass::Free,

            Opcode::ForIter
            | Opcode::JumpForward
            | Opcode::SetupLoop
            | Opcode::SetupExcept
            | Opcode::SetupFinally
            | Opcode::SetupWith
            | Opcode::SetupAsyncWith => OperandClass::JumpRelative,

            Opcode::JumpIfFalseOrPop
            | Opcode::JumpIfTrueOrPop
            | Opcode::JumpAbsolute
            | Opcode::PopJumpIfFalse
            | Opcode::PopJumpIfTrue
            | Opcode::ContinueLoop => OperandClass::JumpAbsolute,

            Opcode::CompareOp => OperandClass::Compare,

            op if op.has_argument() => OperandClass::Literal,
            _ => OperandClass::None,
        }
    }

    /// Returns true if the operand names a jump target
    #[must_use]
    pub fn is_jump(self) -> bool {
        matches!(
            self.operand_class(),
            OperandClass::JumpRelative | OperandClass::JumpAbsolute
        )
    }
}
