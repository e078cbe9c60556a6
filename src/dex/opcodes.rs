use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::dex::opcode_format::{Format, OpcodeFlags, ReferenceType};

/// Static properties of an opcode.
#[derive(Debug)]
pub struct OpcodeInfo {
    pub opcode: Opcode,
    /// Opcode byte, or the payload identifier for pseudo-instructions.
    pub value: u16,
    pub name: &'static str,
    pub reference_type: ReferenceType,
    pub format: Format,
    pub flags: OpcodeFlags,
}

const CONT: OpcodeFlags = OpcodeFlags::CAN_CONTINUE;
const THROW: OpcodeFlags = OpcodeFlags::CAN_THROW;
const SETS_REG: OpcodeFlags = OpcodeFlags::SETS_REGISTER;
const WIDE: OpcodeFlags = OpcodeFlags::SETS_WIDE_REGISTER;
const RESULT: OpcodeFlags = OpcodeFlags::SETS_RESULT;
const STATIC: OpcodeFlags = OpcodeFlags::STATIC_FIELD_ACCESSOR;
const INIT: OpcodeFlags = OpcodeFlags::CAN_INITIALIZE_REFERENCE;
const BRANCH: OpcodeFlags = OpcodeFlags::BRANCH;
const COND: OpcodeFlags = OpcodeFlags::CONDITIONAL;
const PAYLOAD_REF: OpcodeFlags = OpcodeFlags::PAYLOAD_REFERENCE;
const NONE: OpcodeFlags = OpcodeFlags::empty();

// The enum and the table are generated together so `Opcode as usize` indexes OPCODES.
macro_rules! opcodes {
    ($( $variant:ident = $value:literal, $name:literal, $format:ident, $reference:ident, $flags:expr; )*) => {
        /// Every standard Dalvik opcode plus the three payload pseudo-opcodes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Opcode {
            $( $variant, )*
        }

        static OPCODES: Lazy<Vec<OpcodeInfo>> = Lazy::new(|| {
            vec![
                $(
                    OpcodeInfo {
                        opcode: Opcode::$variant,
                        value: $value,
                        name: $name,
                        reference_type: ReferenceType::$reference,
                        format: Format::$format,
                        flags: $flags,
                    },
                )*
            ]
        });
    };
}

opcodes! {
    Nop = 0x00, "nop", Format10x, None, CONT;
    Move = 0x01, "move", Format12x, None, CONT | SETS_REG;
    MoveFrom16 = 0x02, "move/from16", Format22x, None, CONT | SETS_REG;
    Move16 = 0x03, "move/16", Format32x, None, CONT | SETS_REG;
    MoveWide = 0x04, "move-wide", Format12x, None, CONT | SETS_REG | WIDE;
    MoveWideFrom16 = 0x05, "move-wide/from16", Format22x, None, CONT | SETS_REG | WIDE;
    MoveWide16 = 0x06, "move-wide/16", Format32x, None, CONT | SETS_REG | WIDE;
    MoveObject = 0x07, "move-object", Format12x, None, CONT | SETS_REG;
    MoveObjectFrom16 = 0x08, "move-object/from16", Format22x, None, CONT | SETS_REG;
    MoveObject16 = 0x09, "move-object/16", Format32x, None, CONT | SETS_REG;
    MoveResult = 0x0a, "move-result", Format11x, None, CONT | SETS_REG;
    MoveResultWide = 0x0b, "move-result-wide", Format11x, None, CONT | SETS_REG | WIDE;
    MoveResultObject = 0x0c, "move-result-object", Format11x, None, CONT | SETS_REG;
    MoveException = 0x0d, "move-exception", Format11x, None, CONT | SETS_REG;
    ReturnVoid = 0x0e, "return-void", Format10x, None, NONE;
    Return = 0x0f, "return", Format11x, None, NONE;
    ReturnWide = 0x10, "return-wide", Format11x, None, NONE;
    ReturnObject = 0x11, "return-object", Format11x, None, NONE;
    Const4 = 0x12, "const/4", Format11n, None, CONT | SETS_REG;
    Const16 = 0x13, "const/16", Format21s, None, CONT | SETS_REG;
    Const = 0x14, "const", Format31i, None, CONT | SETS_REG;
    ConstHigh16 = 0x15, "const/high16", Format21ih, None, CONT | SETS_REG;
    ConstWide16 = 0x16, "const-wide/16", Format21s, None, CONT | SETS_REG | WIDE;
    ConstWide32 = 0x17, "const-wide/32", Format31i, None, CONT | SETS_REG | WIDE;
    ConstWide = 0x18, "const-wide", Format51l, None, CONT | SETS_REG | WIDE;
    ConstWideHigh16 = 0x19, "const-wide/high16", Format21lh, None, CONT | SETS_REG | WIDE;
    ConstString = 0x1a, "const-string", Format21c, String, THROW | CONT | SETS_REG;
    ConstStringJumbo = 0x1b, "const-string/jumbo", Format31c, String, THROW | CONT | SETS_REG;
    ConstClass = 0x1c, "const-class", Format21c, Type, THROW | CONT | SETS_REG;
    MonitorEnter = 0x1d, "monitor-enter", Format11x, None, THROW | CONT;
    MonitorExit = 0x1e, "monitor-exit", Format11x, None, THROW | CONT;
    CheckCast = 0x1f, "check-cast", Format21c, Type, THROW | CONT | SETS_REG;
    InstanceOf = 0x20, "instance-of", Format22c, Type, THROW | CONT | SETS_REG;
    ArrayLength = 0x21, "array-length", Format12x, None, THROW | CONT | SETS_REG;
    NewInstance = 0x22, "new-instance", Format21c, Type, THROW | CONT | SETS_REG;
    NewArray = 0x23, "new-array", Format22c, Type, THROW | CONT | SETS_REG;
    FilledNewArray = 0x24, "filled-new-array", Format35c, Type, THROW | CONT | RESULT;
    FilledNewArrayRange = 0x25, "filled-new-array/range", Format3rc, Type, THROW | CONT | RESULT;
    FillArrayData = 0x26, "fill-array-data", Format31t, None, CONT | PAYLOAD_REF;
    Throw = 0x27, "throw", Format11x, None, THROW;
    Goto = 0x28, "goto", Format10t, None, BRANCH;
    Goto16 = 0x29, "goto/16", Format20t, None, BRANCH;
    Goto32 = 0x2a, "goto/32", Format30t, None, BRANCH;
    PackedSwitch = 0x2b, "packed-switch", Format31t, None, CONT | PAYLOAD_REF;
    SparseSwitch = 0x2c, "sparse-switch", Format31t, None, CONT | PAYLOAD_REF;
    CmplFloat = 0x2d, "cmpl-float", Format23x, None, CONT | SETS_REG;
    CmpgFloat = 0x2e, "cmpg-float", Format23x, None, CONT | SETS_REG;
    CmplDouble = 0x2f, "cmpl-double", Format23x, None, CONT | SETS_REG;
    CmpgDouble = 0x30, "cmpg-double", Format23x, None, CONT | SETS_REG;
    CmpLong = 0x31, "cmp-long", Format23x, None, CONT | SETS_REG;
    IfEq = 0x32, "if-eq", Format22t, None, CONT | BRANCH | COND;
    IfNe = 0x33, "if-ne", Format22t, None, CONT | BRANCH | COND;
    IfLt = 0x34, "if-lt", Format22t, None, CONT | BRANCH | COND;
    IfGe = 0x35, "if-ge", Format22t, None, CONT | BRANCH | COND;
    IfGt = 0x36, "if-gt", Format22t, None, CONT | BRANCH | COND;
    IfLe = 0x37, "if-le", Format22t, None, CONT | BRANCH | COND;
    IfEqz = 0x38, "if-eqz", Format21t, None, CONT | BRANCH | COND;
    IfNez = 0x39, "if-nez", Format21t, None, CONT | BRANCH | COND;
    IfLtz = 0x3a, "if-ltz", Format21t, None, CONT | BRANCH | COND;
    IfGez = 0x3b, "if-gez", Format21t, None, CONT | BRANCH | COND;
    IfGtz = 0x3c, "if-gtz", Format21t, None, CONT | BRANCH | COND;
    IfLez = 0x3d, "if-lez", Format21t, None, CONT | BRANCH | COND;
    Aget = 0x44, "aget", Format23x, None, THROW | CONT | SETS_REG;
    AgetWide = 0x45, "aget-wide", Format23x, None, THROW | CONT | SETS_REG | WIDE;
    AgetObject = 0x46, "aget-object", Format23x, None, THROW | CONT | SETS_REG;
    AgetBoolean = 0x47, "aget-boolean", Format23x, None, THROW | CONT | SETS_REG;
    AgetByte = 0x48, "aget-byte", Format23x, None, THROW | CONT | SETS_REG;
    AgetChar = 0x49, "aget-char", Format23x, None, THROW | CONT | SETS_REG;
    AgetShort = 0x4a, "aget-short", Format23x, None, THROW | CONT | SETS_REG;
    Aput = 0x4b, "aput", Format23x, None, THROW | CONT;
    AputWide = 0x4c, "aput-wide", Format23x, None, THROW | CONT;
    AputObject = 0x4d, "aput-object", Format23x, None, THROW | CONT;
    AputBoolean = 0x4e, "aput-boolean", Format23x, None, THROW | CONT;
    AputByte = 0x4f, "aput-byte", Format23x, None, THROW | CONT;
    AputChar = 0x50, "aput-char", Format23x, None, THROW | CONT;
    AputShort = 0x51, "aput-short", Format23x, None, THROW | CONT;
    Iget = 0x52, "iget", Format22c, Field, THROW | CONT | SETS_REG;
    IgetWide = 0x53, "iget-wide", Format22c, Field, THROW | CONT | SETS_REG | WIDE;
    IgetObject = 0x54, "iget-object", Format22c, Field, THROW | CONT | SETS_REG;
    IgetBoolean = 0x55, "iget-boolean", Format22c, Field, THROW | CONT | SETS_REG;
    IgetByte = 0x56, "iget-byte", Format22c, Field, THROW | CONT | SETS_REG;
    IgetChar = 0x57, "iget-char", Format22c, Field, THROW | CONT | SETS_REG;
    IgetShort = 0x58, "iget-short", Format22c, Field, THROW | CONT | SETS_REG;
    Iput = 0x59, "iput", Format22c, Field, THROW | CONT;
    IputWide = 0x5a, "iput-wide", Format22c, Field, THROW | CONT;
    IputObject = 0x5b, "iput-object", Format22c, Field, THROW | CONT;
    IputBoolean = 0x5c, "iput-boolean", Format22c, Field, THROW | CONT;
    IputByte = 0x5d, "iput-byte", Format22c, Field, THROW | CONT;
    IputChar = 0x5e, "iput-char", Format22c, Field, THROW | CONT;
    IputShort = 0x5f, "iput-short", Format22c, Field, THROW | CONT;
    Sget = 0x60, "sget", Format21c, Field, THROW | CONT | SETS_REG | STATIC;
    SgetWide = 0x61, "sget-wide", Format21c, Field, THROW | CONT | SETS_REG | WIDE | STATIC;
    SgetObject = 0x62, "sget-object", Format21c, Field, THROW | CONT | SETS_REG | STATIC;
    SgetBoolean = 0x63, "sget-boolean", Format21c, Field, THROW | CONT | SETS_REG | STATIC;
    SgetByte = 0x64, "sget-byte", Format21c, Field, THROW | CONT | SETS_REG | STATIC;
    SgetChar = 0x65, "sget-char", Format21c, Field, THROW | CONT | SETS_REG | STATIC;
    SgetShort = 0x66, "sget-short", Format21c, Field, THROW | CONT | SETS_REG | STATIC;
    Sput = 0x67, "sput", Format21c, Field, THROW | CONT | STATIC;
    SputWide = 0x68, "sput-wide", Format21c, Field, THROW | CONT | STATIC;
    SputObject = 0x69, "sput-object", Format21c, Field, THROW | CONT | STATIC;
    SputBoolean = 0x6a, "sput-boolean", Format21c, Field, THROW | CONT | STATIC;
    SputByte = 0x6b, "sput-byte", Format21c, Field, THROW | CONT | STATIC;
    SputChar = 0x6c, "sput-char", Format21c, Field, THROW | CONT | STATIC;
    SputShort = 0x6d, "sput-short", Format21c, Field, THROW | CONT | STATIC;
    InvokeVirtual = 0x6e, "invoke-virtual", Format35c, Method, THROW | CONT | RESULT;
    InvokeSuper = 0x6f, "invoke-super", Format35c, Method, THROW | CONT | RESULT;
    InvokeDirect = 0x70, "invoke-direct", Format35c, Method, THROW | CONT | RESULT | INIT;
    InvokeStatic = 0x71, "invoke-static", Format35c, Method, THROW | CONT | RESULT;
    InvokeInterface = 0x72, "invoke-interface", Format35c, Method, THROW | CONT | RESULT;
    InvokeVirtualRange = 0x74, "invoke-virtual/range", Format3rc, Method, THROW | CONT | RESULT;
    InvokeSuperRange = 0x75, "invoke-super/range", Format3rc, Method, THROW | CONT | RESULT;
    InvokeDirectRange = 0x76, "invoke-direct/range", Format3rc, Method, THROW | CONT | RESULT | INIT;
    InvokeStaticRange = 0x77, "invoke-static/range", Format3rc, Method, THROW | CONT | RESULT;
    InvokeInterfaceRange = 0x78, "invoke-interface/range", Format3rc, Method, THROW | CONT | RESULT;
    NegInt = 0x7b, "neg-int", Format12x, None, CONT | SETS_REG;
    NotInt = 0x7c, "not-int", Format12x, None, CONT | SETS_REG;
    NegLong = 0x7d, "neg-long", Format12x, None, CONT | SETS_REG | WIDE;
    NotLong = 0x7e, "not-long", Format12x, None, CONT | SETS_REG | WIDE;
    NegFloat = 0x7f, "neg-float", Format12x, None, CONT | SETS_REG;
    NegDouble = 0x80, "neg-double", Format12x, None, CONT | SETS_REG | WIDE;
    IntToLong = 0x81, "int-to-long", Format12x, None, CONT | SETS_REG | WIDE;
    IntToFloat = 0x82, "int-to-float", Format12x, None, CONT | SETS_REG;
    IntToDouble = 0x83, "int-to-double", Format12x, None, CONT | SETS_REG | WIDE;
    LongToInt = 0x84, "long-to-int", Format12x, None, CONT | SETS_REG;
    LongToFloat = 0x85, "long-to-float", Format12x, None, CONT | SETS_REG;
    LongToDouble = 0x86, "long-to-double", Format12x, None, CONT | SETS_REG | WIDE;
    FloatToInt = 0x87, "float-to-int", Format12x, None, CONT | SETS_REG;
    FloatToLong = 0x88, "float-to-long", Format12x, None, CONT | SETS_REG | WIDE;
    FloatToDouble = 0x89, "float-to-double", Format12x, None, CONT | SETS_REG | WIDE;
    DoubleToInt = 0x8a, "double-to-int", Format12x, None, CONT | SETS_REG;
    DoubleToLong = 0x8b, "double-to-long", Format12x, None, CONT | SETS_REG | WIDE;
    DoubleToFloat = 0x8c, "double-to-float", Format12x, None, CONT | SETS_REG;
    IntToByte = 0x8d, "int-to-byte", Format12x, None, CONT | SETS_REG;
    IntToChar = 0x8e, "int-to-char", Format12x, None, CONT | SETS_REG;
    IntToShort = 0x8f, "int-to-short", Format12x, None, CONT | SETS_REG;
    AddInt = 0x90, "add-int", Format23x, None, CONT | SETS_REG;
    SubInt = 0x91, "sub-int", Format23x, None, CONT | SETS_REG;
    MulInt = 0x92, "mul-int", Format23x, None, CONT | SETS_REG;
    DivInt = 0x93, "div-int", Format23x, None, THROW | CONT | SETS_REG;
    RemInt = 0x94, "rem-int", Format23x, None, THROW | CONT | SETS_REG;
    AndInt = 0x95, "and-int", Format23x, None, CONT | SETS_REG;
    OrInt = 0x96, "or-int", Format23x, None, CONT | SETS_REG;
    XorInt = 0x97, "xor-int", Format23x, None, CONT | SETS_REG;
    ShlInt = 0x98, "shl-int", Format23x, None, CONT | SETS_REG;
    ShrInt = 0x99, "shr-int", Format23x, None, CONT | SETS_REG;
    UshrInt = 0x9a, "ushr-int", Format23x, None, CONT | SETS_REG;
    AddLong = 0x9b, "add-long", Format23x, None, CONT | SETS_REG | WIDE;
    SubLong = 0x9c, "sub-long", Format23x, None, CONT | SETS_REG | WIDE;
    MulLong = 0x9d, "mul-long", Format23x, None, CONT | SETS_REG | WIDE;
    DivLong = 0x9e, "div-long", Format23x, None, THROW | CONT | SETS_REG | WIDE;
    RemLong = 0x9f, "rem-long", Format23x, None, THROW | CONT | SETS_REG | WIDE;
    AndLong = 0xa0, "and-long", Format23x, None, CONT | SETS_REG | WIDE;
    OrLong = 0xa1, "or-long", Format23x, None, CONT | SETS_REG | WIDE;
    XorLong = 0xa2, "xor-long", Format23x, None, CONT | SETS_REG | WIDE;
    ShlLong = 0xa3, "shl-long", Format23x, None, CONT | SETS_REG | WIDE;
    ShrLong = 0xa4, "shr-long", Format23x, None, CONT | SETS_REG | WIDE;
    UshrLong = 0xa5, "ushr-long", Format23x, None, CONT | SETS_REG | WIDE;
    AddFloat = 0xa6, "add-float", Format23x, None, CONT | SETS_REG;
    SubFloat = 0xa7, "sub-float", Format23x, None, CONT | SETS_REG;
    MulFloat = 0xa8, "mul-float", Format23x, None, CONT | SETS_REG;
    DivFloat = 0xa9, "div-float", Format23x, None, CONT | SETS_REG;
    RemFloat = 0xaa, "rem-float", Format23x, None, CONT | SETS_REG;
    AddDouble = 0xab, "add-double", Format23x, None, CONT | SETS_REG | WIDE;
    SubDouble = 0xac, "sub-double", Format23x, None, CONT | SETS_REG | WIDE;
    MulDouble = 0xad, "mul-double", Format23x, None, CONT | SETS_REG | WIDE;
    DivDouble = 0xae, "div-double", Format23x, None, CONT | SETS_REG | WIDE;
    RemDouble = 0xaf, "rem-double", Format23x, None, CONT | SETS_REG | WIDE;
    AddInt2Addr = 0xb0, "add-int/2addr", Format12x, None, CONT | SETS_REG;
    SubInt2Addr = 0xb1, "sub-int/2addr", Format12x, None, CONT | SETS_REG;
    MulInt2Addr = 0xb2, "mul-int/2addr", Format12x, None, CONT | SETS_REG;
    DivInt2Addr = 0xb3, "div-int/2addr", Format12x, None, THROW | CONT | SETS_REG;
    RemInt2Addr = 0xb4, "rem-int/2addr", Format12x, None, THROW | CONT | SETS_REG;
    AndInt2Addr = 0xb5, "and-int/2addr", Format12x, None, CONT | SETS_REG;
    OrInt2Addr = 0xb6, "or-int/2addr", Format12x, None, CONT | SETS_REG;
    XorInt2Addr = 0xb7, "xor-int/2addr", Format12x, None, CONT | SETS_REG;
    ShlInt2Addr = 0xb8, "shl-int/2addr", Format12x, None, CONT | SETS_REG;
    ShrInt2Addr = 0xb9, "shr-int/2addr", Format12x, None, CONT | SETS_REG;
    UshrInt2Addr = 0xba, "ushr-int/2addr", Format12x, None, CONT | SETS_REG;
    AddLong2Addr = 0xbb, "add-long/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    SubLong2Addr = 0xbc, "sub-long/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    MulLong2Addr = 0xbd, "mul-long/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    DivLong2Addr = 0xbe, "div-long/2addr", Format12x, None, THROW | CONT | SETS_REG | WIDE;
    RemLong2Addr = 0xbf, "rem-long/2addr", Format12x, None, THROW | CONT | SETS_REG | WIDE;
    AndLong2Addr = 0xc0, "and-long/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    OrLong2Addr = 0xc1, "or-long/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    XorLong2Addr = 0xc2, "xor-long/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    ShlLong2Addr = 0xc3, "shl-long/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    ShrLong2Addr = 0xc4, "shr-long/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    UshrLong2Addr = 0xc5, "ushr-long/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    AddFloat2Addr = 0xc6, "add-float/2addr", Format12x, None, CONT | SETS_REG;
    SubFloat2Addr = 0xc7, "sub-float/2addr", Format12x, None, CONT | SETS_REG;
    MulFloat2Addr = 0xc8, "mul-float/2addr", Format12x, None, CONT | SETS_REG;
    DivFloat2Addr = 0xc9, "div-float/2addr", Format12x, None, CONT | SETS_REG;
    RemFloat2Addr = 0xca, "rem-float/2addr", Format12x, None, CONT | SETS_REG;
    AddDouble2Addr = 0xcb, "add-double/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    SubDouble2Addr = 0xcc, "sub-double/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    MulDouble2Addr = 0xcd, "mul-double/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    DivDouble2Addr = 0xce, "div-double/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    RemDouble2Addr = 0xcf, "rem-double/2addr", Format12x, None, CONT | SETS_REG | WIDE;
    AddIntLit16 = 0xd0, "add-int/lit16", Format22s, None, CONT | SETS_REG;
    RsubInt = 0xd1, "rsub-int", Format22s, None, CONT | SETS_REG;
    MulIntLit16 = 0xd2, "mul-int/lit16", Format22s, None, CONT | SETS_REG;
    DivIntLit16 = 0xd3, "div-int/lit16", Format22s, None, THROW | CONT | SETS_REG;
    RemIntLit16 = 0xd4, "rem-int/lit16", Format22s, None, THROW | CONT | SETS_REG;
    AndIntLit16 = 0xd5, "and-int/lit16", Format22s, None, CONT | SETS_REG;
    OrIntLit16 = 0xd6, "or-int/lit16", Format22s, None, CONT | SETS_REG;
    XorIntLit16 = 0xd7, "xor-int/lit16", Format22s, None, CONT | SETS_REG;
    AddIntLit8 = 0xd8, "add-int/lit8", Format22b, None, CONT | SETS_REG;
    RsubIntLit8 = 0xd9, "rsub-int/lit8", Format22b, None, CONT | SETS_REG;
    MulIntLit8 = 0xda, "mul-int/lit8", Format22b, None, CONT | SETS_REG;
    DivIntLit8 = 0xdb, "div-int/lit8", Format22b, None, THROW | CONT | SETS_REG;
    RemIntLit8 = 0xdc, "rem-int/lit8", Format22b, None, THROW | CONT | SETS_REG;
    AndIntLit8 = 0xdd, "and-int/lit8", Format22b, None, CONT | SETS_REG;
    OrIntLit8 = 0xde, "or-int/lit8", Format22b, None, CONT | SETS_REG;
    XorIntLit8 = 0xdf, "xor-int/lit8", Format22b, None, CONT | SETS_REG;
    ShlIntLit8 = 0xe0, "shl-int/lit8", Format22b, None, CONT | SETS_REG;
    ShrIntLit8 = 0xe1, "shr-int/lit8", Format22b, None, CONT | SETS_REG;
    UshrIntLit8 = 0xe2, "ushr-int/lit8", Format22b, None, CONT | SETS_REG;
    InvokePolymorphic = 0xfa, "invoke-polymorphic", Format45cc, Method, THROW | CONT | RESULT;
    InvokePolymorphicRange = 0xfb, "invoke-polymorphic/range", Format4rcc, Method, THROW | CONT | RESULT;
    InvokeCustom = 0xfc, "invoke-custom", Format35c, CallSite, THROW | CONT | RESULT;
    InvokeCustomRange = 0xfd, "invoke-custom/range", Format3rc, CallSite, THROW | CONT | RESULT;
    ConstMethodHandle = 0xfe, "const-method-handle", Format21c, MethodHandle, THROW | CONT | SETS_REG;
    ConstMethodType = 0xff, "const-method-type", Format21c, MethodProto, THROW | CONT | SETS_REG;
    PackedSwitchPayload = 0x0100, "packed-switch-payload", PackedSwitchPayload, None, NONE;
    SparseSwitchPayload = 0x0200, "sparse-switch-payload", SparseSwitchPayload, None, NONE;
    ArrayPayload = 0x0300, "array-payload", ArrayPayload, None, NONE;
}

static OPCODES_BY_NAME: Lazy<HashMap<&'static str, Opcode>> =
    Lazy::new(|| OPCODES.iter().map(|info| (info.name, info.opcode)).collect());

impl Opcode {
    pub fn info(self) -> &'static OpcodeInfo {
        &OPCODES[self as usize]
    }

    /// Looks up an opcode by its smali mnemonic, e.g. `"goto/16"`.
    pub fn from_name(name: &str) -> Option<Opcode> {
        OPCODES_BY_NAME.get(name).copied()
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn value(self) -> u16 {
        self.info().value
    }

    pub fn format(self) -> Format {
        self.info().format
    }

    pub fn flags(self) -> OpcodeFlags {
        self.info().flags
    }

    pub fn reference_type(self) -> ReferenceType {
        self.info().reference_type
    }

    /// The second reference carried by invoke-polymorphic (the call-site prototype).
    pub fn reference_type2(self) -> Option<ReferenceType> {
        match self {
            Opcode::InvokePolymorphic | Opcode::InvokePolymorphicRange => {
                Some(ReferenceType::MethodProto)
            }
            _ => None,
        }
    }

    pub fn can_continue(self) -> bool {
        self.flags().contains(OpcodeFlags::CAN_CONTINUE)
    }

    pub fn is_branch(self) -> bool {
        self.flags().contains(OpcodeFlags::BRANCH)
    }

    pub fn is_conditional_branch(self) -> bool {
        self.flags().contains(OpcodeFlags::CONDITIONAL)
    }

    pub fn is_payload_reference(self) -> bool {
        self.flags().contains(OpcodeFlags::PAYLOAD_REFERENCE)
    }

    pub fn is_payload(self) -> bool {
        self.format().is_payload_format()
    }

    /// The payload kind a payload-referencing opcode must point at.
    pub fn expected_payload(self) -> Option<Opcode> {
        match self {
            Opcode::FillArrayData => Some(Opcode::ArrayPayload),
            Opcode::PackedSwitch => Some(Opcode::PackedSwitchPayload),
            Opcode::SparseSwitch => Some(Opcode::SparseSwitchPayload),
            _ => None,
        }
    }

    /// The next wider unconditional branch.
    pub fn promoted(self) -> Option<Opcode> {
        match self {
            Opcode::Goto => Some(Opcode::Goto16),
            Opcode::Goto16 => Some(Opcode::Goto32),
            _ => None,
        }
    }

    /// The conditional branch taken exactly when `self` is not.
    pub fn inverted(self) -> Option<Opcode> {
        let inverse = match self {
            Opcode::IfEq => Opcode::IfNe,
            Opcode::IfNe => Opcode::IfEq,
            Opcode::IfLt => Opcode::IfGe,
            Opcode::IfGe => Opcode::IfLt,
            Opcode::IfGt => Opcode::IfLe,
            Opcode::IfLe => Opcode::IfGt,
            Opcode::IfEqz => Opcode::IfNez,
            Opcode::IfNez => Opcode::IfEqz,
            Opcode::IfLtz => Opcode::IfGez,
            Opcode::IfGez => Opcode::IfLtz,
            Opcode::IfGtz => Opcode::IfLez,
            Opcode::IfLez => Opcode::IfGtz,
            _ => return None,
        };
        Some(inverse)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
