//! Opcode definitions and dispatch tables
//!
//! A program is a flat byte string: one opcode byte followed by that
//! opcode's inline operand. There is no operand table; the opcode alone
//! decides how many bytes to consume.
//!
//! # Opcode spaces
//!
//! The primary space is one byte. Four escape opcodes each open a secondary
//! one-byte space so the primary space does not run out:
//!
//! | Escape       | Space                  | Entries                      |
//! |--------------|------------------------|------------------------------|
//! | `EscConst`   | character constants    | [`CharConst`]                |
//! | `EscSet`     | assignments            | [`SetOp`]                    |
//! | `EscEx`      | extended triggers      | [`EX_SPACE`]                 |
//! | `EscEx2`     | extended triggers, 2   | [`EX2_SPACE`]                |
//!
//! Escaped opcodes follow the same operand and stack rules as primary ones
//! and share the instruction pointer.
//!
//! Redirections and the hottest trigger getters are table entries inside the
//! primary space (see [`REDIRECT_BASE`] and [`TRIGGER_BASE`]), decoded by
//! [`decode_primary`].
//!
//! # Operand encoding
//!
//! All multi-byte operands are little-endian. Jump offsets are signed and
//! relative to the byte after the offset operand.

use std::fmt;

macro_rules! byte_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $mnemonic:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $val, )*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $( $val => Some($name::$variant), )*
                    _ => None,
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $( $name::$variant => $mnemonic, )*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.mnemonic())
            }
        }
    };
}

/// Shape of the inline operand following an opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    I8,
    I32,
    I64,
    F32,
    /// Unsigned byte: local variable index or field selector
    U8,
    /// Signed 1-byte relative jump
    Jump8,
    /// Signed 4-byte relative jump
    Jump32,
    /// u32 length followed by that many bytes of nested program
    SubProgram,
    /// Secondary opcode byte, then that opcode's own operand
    Escape(Space),
}

impl Operand {
    /// Fixed width in bytes, when the operand has one
    pub fn width(self) -> Option<usize> {
        match self {
            Operand::None => Some(0),
            Operand::I8 | Operand::U8 | Operand::Jump8 => Some(1),
            Operand::I32 | Operand::F32 | Operand::Jump32 => Some(4),
            Operand::I64 => Some(8),
            Operand::SubProgram | Operand::Escape(_) => None,
        }
    }
}

/// Which opcode table a byte was looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    Primary,
    Const,
    Set,
    Ex,
    Ex2,
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Space::Primary => "primary",
            Space::Const => "const",
            Space::Set => "set",
            Space::Ex => "ex",
            Space::Ex2 => "ex2",
        };
        f.write_str(name)
    }
}

byte_enum! {
    /// Primary-space opcodes with dedicated interpreter arms
    pub enum OpCode {
        // Literals
        Int8 = 0x01 => "int8",
        Int32 = 0x02 => "int",
        Int64 = 0x03 => "int64",
        Float = 0x04 => "float",
        SFalse = 0x05 => "sfalse",

        // Stack
        Pop = 0x08 => "pop",
        Dup = 0x09 => "dup",
        Swap = 0x0a => "swap",

        // Nested programs
        Run = 0x0c => "run",
        RunOriginal = 0x0d => "run.orig",

        // Branches (conditional forms peek, never pop)
        Jmp8 = 0x10 => "jmp8",
        Jz8 = 0x11 => "jz8",
        Jnz8 = 0x12 => "jnz8",
        Jsf8 = 0x13 => "jsf8",
        Jmp = 0x14 => "jmp",
        Jz = 0x15 => "jz",
        Jnz = 0x16 => "jnz",
        Jsf = 0x17 => "jsf",

        // Comparison
        Eq = 0x20 => "eq",
        Ne = 0x21 => "ne",
        Gt = 0x22 => "gt",
        Ge = 0x23 => "ge",
        Lt = 0x24 => "lt",
        Le = 0x25 => "le",

        // Unary
        Neg = 0x28 => "neg",
        BlNot = 0x29 => "blnot",
        Not = 0x2a => "not",
        Abs = 0x2b => "abs",

        // Logical / bitwise
        BlAnd = 0x30 => "bland",
        BlOr = 0x31 => "blor",
        BlXor = 0x32 => "blxor",
        And = 0x33 => "and",
        Or = 0x34 => "or",
        Xor = 0x35 => "xor",

        // Arithmetic
        Add = 0x38 => "add",
        Sub = 0x39 => "sub",
        Mul = 0x3a => "mul",
        Div = 0x3b => "div",
        Mod = 0x3c => "mod",
        Pow = 0x3d => "pow",

        // Math
        Exp = 0x40 => "exp",
        Ln = 0x41 => "ln",
        Log = 0x42 => "log",
        Sqrt = 0x43 => "sqrt",
        Sin = 0x44 => "sin",
        Cos = 0x45 => "cos",
        Tan = 0x46 => "tan",
        Asin = 0x47 => "asin",
        Acos = 0x48 => "acos",
        Atan = 0x49 => "atan",
        Floor = 0x4a => "floor",
        Ceil = 0x4b => "ceil",
        Min = 0x4c => "min",
        Max = 0x4d => "max",
        IfElse = 0x4e => "ifelse",
        Random = 0x4f => "random",

        // Variables
        Var = 0x50 => "var",
        FVar = 0x51 => "fvar",
        SysVar = 0x52 => "sysvar",
        SysFVar = 0x53 => "sysfvar",
        LocalVar = 0x54 => "localvar",

        // Escapes
        EscConst = 0xf0 => "const.",
        EscSet = 0xf1 => "st.",
        EscEx = 0xf2 => "ex.",
        EscEx2 = 0xf3 => "ex2.",
    }
}

impl OpCode {
    pub fn operand(self) -> Operand {
        match self {
            OpCode::Int8 => Operand::I8,
            OpCode::Int32 => Operand::I32,
            OpCode::Int64 => Operand::I64,
            OpCode::Float => Operand::F32,
            OpCode::Run | OpCode::RunOriginal => Operand::SubProgram,
            OpCode::Jmp8 | OpCode::Jz8 | OpCode::Jnz8 | OpCode::Jsf8 => Operand::Jump8,
            OpCode::Jmp | OpCode::Jz | OpCode::Jnz | OpCode::Jsf => Operand::Jump32,
            OpCode::LocalVar => Operand::U8,
            OpCode::EscConst => Operand::Escape(Space::Const),
            OpCode::EscSet => Operand::Escape(Space::Set),
            OpCode::EscEx => Operand::Escape(Space::Ex),
            OpCode::EscEx2 => Operand::Escape(Space::Ex2),
            _ => Operand::None,
        }
    }

    pub fn is_jump(self) -> bool {
        matches!(self.operand(), Operand::Jump8 | Operand::Jump32)
    }
}

byte_enum! {
    /// Subject redirections. Each carries a 4-byte skip distance used when
    /// the redirection cannot be resolved.
    pub enum Redirect {
        PlayerId = 0 => "playerid",
        Parent = 1 => "parent",
        Root = 2 => "root",
        Helper = 3 => "helper",
        Target = 4 => "target",
        Partner = 5 => "partner",
        Enemy = 6 => "enemy",
        EnemyNear = 7 => "enemynear",
        HelperIndex = 8 => "helperindex",
        P2 = 9 => "p2",
    }
}

impl Redirect {
    /// Whether the redirection pops an index argument
    pub fn takes_index(self) -> bool {
        !matches!(self, Redirect::Parent | Redirect::Root | Redirect::P2)
    }
}

byte_enum! {
    /// Zero-argument getters answered by the world collaborator
    pub enum Trigger {
        Time = 0 => "time",
        AnimTime = 1 => "animtime",
        Anim = 2 => "anim",
        StateNo = 3 => "stateno",
        PrevStateNo = 4 => "prevstateno",
        Ctrl = 5 => "ctrl",
        StateType = 6 => "statetype",
        MoveType = 7 => "movetype",
        PosX = 8 => "pos.x",
        PosY = 9 => "pos.y",
        VelX = 10 => "vel.x",
        VelY = 11 => "vel.y",
        Life = 12 => "life",
        Power = 13 => "power",
        Alive = 14 => "alive",
        Facing = 15 => "facing",
        Id = 16 => "id",
        HitPauseTime = 17 => "hitpausetime",

        ScreenPosX = 32 => "screenpos.x",
        ScreenPosY = 33 => "screenpos.y",
        FrontEdgeDist = 34 => "frontedgedist",
        BackEdgeDist = 35 => "backedgedist",
        FrontEdgeBodyDist = 36 => "frontedgebodydist",
        BackEdgeBodyDist = 37 => "backedgebodydist",
        GameTime = 38 => "gametime",
        RoundNo = 39 => "roundno",
        RoundState = 40 => "roundstate",
        MatchNo = 41 => "matchno",
        MatchOver = 42 => "matchover",
        RoundsExisted = 43 => "roundsexisted",
        NumEnemy = 44 => "numenemy",
        NumPartner = 45 => "numpartner",
        HitCount = 46 => "hitcount",
        UniqHitCount = 47 => "uniqhitcount",
        HitShakeOver = 48 => "hitshakeover",
        HitOver = 49 => "hitover",
        HitFall = 50 => "hitfall",
        MoveContact = 51 => "movecontact",
        MoveHit = 52 => "movehit",
        MoveGuarded = 53 => "moveguarded",
        MoveReversed = 54 => "movereversed",
        CanRecover = 55 => "canrecover",
        InGuardDist = 56 => "inguarddist",
        P2DistX = 57 => "p2dist.x",
        P2DistY = 58 => "p2dist.y",
        P2BodyDistX = 59 => "p2bodydist.x",
        P2BodyDistY = 60 => "p2bodydist.y",
        P2Life = 61 => "p2life",
        P2StateNo = 62 => "p2stateno",
        ParentDistX = 63 => "parentdist.x",
        ParentDistY = 64 => "parentdist.y",
        RootDistX = 65 => "rootdist.x",
        RootDistY = 66 => "rootdist.y",
        TeamSide = 67 => "teamside",
        PalNo = 68 => "palno",
        AiLevel = 69 => "ailevel",
        LifeMax = 70 => "lifemax",
        PowerMax = 71 => "powermax",
        Win = 72 => "win",
        Lose = 73 => "lose",
        DrawGame = 74 => "drawgame",
        IsHelper = 75 => "ishelper",

        ComboCount = 96 => "combocount",
        GroundLevel = 97 => "groundlevel",
        Layer = 98 => "layer",
        ReceivedDamage = 99 => "receiveddamage",
        ReceivedHits = 100 => "receivedhits",
        Pause = 101 => "pausetime",
        SuperPause = 102 => "superpausetime",
        GuardPoints = 103 => "guardpoints",
        DizzyPoints = 104 => "dizzypoints",
        RedLife = 105 => "redlife",
    }
}

byte_enum! {
    /// Getters that pop one integer argument first
    pub enum IndexedTrigger {
        AnimElemTime = 0 => "animelemtime",
        AnimElemNo = 1 => "animelemno",
        AnimExist = 2 => "animexist",
        SelfAnimExist = 3 => "selfanimexist",
        NumHelper = 4 => "numhelper",
        NumTarget = 5 => "numtarget",
        NumExplod = 6 => "numexplod",
        NumProjId = 7 => "numprojid",
        ProjContactTime = 8 => "projcontacttime",
        ProjHitTime = 9 => "projhittime",
        ProjGuardedTime = 10 => "projguardedtime",
        IsHelperId = 11 => "ishelper.id",
        Command = 12 => "command",
        StateTime = 13 => "statetime",
    }
}

byte_enum! {
    /// Character constants (`const.` space)
    pub enum CharConst {
        DataLife = 0 => "data.life",
        DataPower = 1 => "data.power",
        DataAttack = 2 => "data.attack",
        DataDefence = 3 => "data.defence",
        DataFallDefenceUp = 4 => "data.fall.defence_up",
        DataLieDownTime = 5 => "data.liedown.time",
        DataAirJuggle = 6 => "data.airjuggle",
        DataSparkNo = 7 => "data.sparkno",
        DataGuardSparkNo = 8 => "data.guard.sparkno",
        SizeXScale = 9 => "size.xscale",
        SizeYScale = 10 => "size.yscale",
        SizeGroundBack = 11 => "size.ground.back",
        SizeGroundFront = 12 => "size.ground.front",
        SizeAirBack = 13 => "size.air.back",
        SizeAirFront = 14 => "size.air.front",
        SizeHeight = 15 => "size.height",
        VelocityWalkFwdX = 16 => "velocity.walk.fwd.x",
        VelocityWalkBackX = 17 => "velocity.walk.back.x",
        VelocityRunFwdX = 18 => "velocity.run.fwd.x",
        VelocityRunFwdY = 19 => "velocity.run.fwd.y",
        VelocityRunBackX = 20 => "velocity.run.back.x",
        VelocityRunBackY = 21 => "velocity.run.back.y",
        VelocityJumpY = 22 => "velocity.jump.y",
        VelocityJumpNeuX = 23 => "velocity.jump.neu.x",
        MovementAirJumpNum = 24 => "movement.airjump.num",
        MovementAirJumpHeight = 25 => "movement.airjump.height",
        MovementYAccel = 26 => "movement.yaccel",
        MovementStandFriction = 27 => "movement.stand.friction",
        MovementCrouchFriction = 28 => "movement.crouch.friction",
    }
}

byte_enum! {
    /// `gethitvar` fields, selected by the byte operand of `ex2.gethitvar`
    pub enum HitVar {
        XVel = 0 => "xvel",
        YVel = 1 => "yvel",
        YAccel = 2 => "yaccel",
        Type = 3 => "type",
        AnimType = 4 => "animtype",
        AirType = 5 => "airtype",
        GroundType = 6 => "groundtype",
        Damage = 7 => "damage",
        HitCount = 8 => "hitcount",
        FallCount = 9 => "fallcount",
        HitShakeTime = 10 => "hitshaketime",
        HitTime = 11 => "hittime",
        SlideTime = 12 => "slidetime",
        CtrlTime = 13 => "ctrltime",
        RecoverTime = 14 => "recovertime",
        XOff = 15 => "xoff",
        YOff = 16 => "yoff",
        Fall = 17 => "fall",
        FallDamage = 18 => "fall.damage",
        FallXVel = 19 => "fall.xvel",
        FallYVel = 20 => "fall.yvel",
        FallRecover = 21 => "fall.recover",
        FallRecoverTime = 22 => "fall.recovertime",
        Guarded = 23 => "guarded",
        IsBound = 24 => "isbound",
        ChainId = 25 => "chainid",
    }
}

/// Persistent variable families addressed through the world collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Int,
    Float,
    SysInt,
    SysFloat,
}

byte_enum! {
    /// Assignment space (`st.`). Every assignment leaves the stored value on
    /// the stack.
    pub enum SetOp {
        /// ( index value -- value )
        Var = 0 => "var",
        FVar = 1 => "fvar",
        SysVar = 2 => "sysvar",
        SysFVar = 3 => "sysfvar",
        /// ( index value -- var+value )
        VarAdd = 4 => "varadd",
        FVarAdd = 5 => "fvaradd",
        SysVarAdd = 6 => "sysvaradd",
        SysFVarAdd = 7 => "sysfvaradd",
        /// ( value -- value ), local index in the byte operand
        Local = 8 => "localvar",
        LocalAdd = 9 => "localvaradd",
    }
}

impl SetOp {
    pub fn operand(self) -> Operand {
        match self {
            SetOp::Local | SetOp::LocalAdd => Operand::U8,
            _ => Operand::None,
        }
    }

    /// Target variable family and whether the value is added
    pub fn target(self) -> (Option<VarKind>, bool) {
        match self {
            SetOp::Var => (Some(VarKind::Int), false),
            SetOp::FVar => (Some(VarKind::Float), false),
            SetOp::SysVar => (Some(VarKind::SysInt), false),
            SetOp::SysFVar => (Some(VarKind::SysFloat), false),
            SetOp::VarAdd => (Some(VarKind::Int), true),
            SetOp::FVarAdd => (Some(VarKind::Float), true),
            SetOp::SysVarAdd => (Some(VarKind::SysInt), true),
            SetOp::SysFVarAdd => (Some(VarKind::SysFloat), true),
            SetOp::Local => (None, false),
            SetOp::LocalAdd => (None, true),
        }
    }
}

/// Entry of an extended-trigger space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExOp {
    /// ( -- v )
    Get(Trigger),
    /// ( index -- v )
    GetIndexed(IndexedTrigger),
    /// ( -- v ), [`HitVar`] selector in the byte operand
    GetHitVar,
}

impl ExOp {
    pub fn operand(self) -> Operand {
        match self {
            ExOp::GetHitVar => Operand::U8,
            _ => Operand::None,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            ExOp::Get(t) => t.mnemonic(),
            ExOp::GetIndexed(t) => t.mnemonic(),
            ExOp::GetHitVar => "gethitvar",
        }
    }
}

/// `ex.` space, indexed by the secondary opcode byte
pub static EX_SPACE: &[ExOp] = &[
    ExOp::Get(Trigger::ScreenPosX),
    ExOp::Get(Trigger::ScreenPosY),
    ExOp::Get(Trigger::FrontEdgeDist),
    ExOp::Get(Trigger::BackEdgeDist),
    ExOp::Get(Trigger::FrontEdgeBodyDist),
    ExOp::Get(Trigger::BackEdgeBodyDist),
    ExOp::Get(Trigger::GameTime),
    ExOp::Get(Trigger::RoundNo),
    ExOp::Get(Trigger::RoundState),
    ExOp::Get(Trigger::MatchNo),
    ExOp::Get(Trigger::MatchOver),
    ExOp::Get(Trigger::RoundsExisted),
    ExOp::Get(Trigger::NumEnemy),
    ExOp::Get(Trigger::NumPartner),
    ExOp::Get(Trigger::HitCount),
    ExOp::Get(Trigger::UniqHitCount),
    ExOp::Get(Trigger::HitShakeOver),
    ExOp::Get(Trigger::HitOver),
    ExOp::Get(Trigger::HitFall),
    ExOp::Get(Trigger::MoveContact),
    ExOp::Get(Trigger::MoveHit),
    ExOp::Get(Trigger::MoveGuarded),
    ExOp::Get(Trigger::MoveReversed),
    ExOp::Get(Trigger::CanRecover),
    ExOp::Get(Trigger::InGuardDist),
    ExOp::Get(Trigger::P2DistX),
    ExOp::Get(Trigger::P2DistY),
    ExOp::Get(Trigger::P2BodyDistX),
    ExOp::Get(Trigger::P2BodyDistY),
    ExOp::Get(Trigger::P2Life),
    ExOp::Get(Trigger::P2StateNo),
    ExOp::Get(Trigger::ParentDistX),
    ExOp::Get(Trigger::ParentDistY),
    ExOp::Get(Trigger::RootDistX),
    ExOp::Get(Trigger::RootDistY),
    ExOp::Get(Trigger::TeamSide),
    ExOp::Get(Trigger::PalNo),
    ExOp::Get(Trigger::AiLevel),
    ExOp::Get(Trigger::LifeMax),
    ExOp::Get(Trigger::PowerMax),
    ExOp::Get(Trigger::Win),
    ExOp::Get(Trigger::Lose),
    ExOp::Get(Trigger::DrawGame),
    ExOp::Get(Trigger::IsHelper),
    ExOp::GetIndexed(IndexedTrigger::AnimElemTime),
    ExOp::GetIndexed(IndexedTrigger::AnimElemNo),
    ExOp::GetIndexed(IndexedTrigger::AnimExist),
    ExOp::GetIndexed(IndexedTrigger::SelfAnimExist),
    ExOp::GetIndexed(IndexedTrigger::NumHelper),
    ExOp::GetIndexed(IndexedTrigger::NumTarget),
    ExOp::GetIndexed(IndexedTrigger::NumExplod),
    ExOp::GetIndexed(IndexedTrigger::NumProjId),
    ExOp::GetIndexed(IndexedTrigger::ProjContactTime),
    ExOp::GetIndexed(IndexedTrigger::ProjHitTime),
    ExOp::GetIndexed(IndexedTrigger::ProjGuardedTime),
    ExOp::GetIndexed(IndexedTrigger::IsHelperId),
];

/// `ex2.` space, indexed by the secondary opcode byte
pub static EX2_SPACE: &[ExOp] = &[
    ExOp::GetHitVar,
    ExOp::Get(Trigger::ComboCount),
    ExOp::Get(Trigger::GroundLevel),
    ExOp::Get(Trigger::Layer),
    ExOp::Get(Trigger::ReceivedDamage),
    ExOp::Get(Trigger::ReceivedHits),
    ExOp::Get(Trigger::Pause),
    ExOp::Get(Trigger::SuperPause),
    ExOp::Get(Trigger::GuardPoints),
    ExOp::Get(Trigger::DizzyPoints),
    ExOp::Get(Trigger::RedLife),
    ExOp::GetIndexed(IndexedTrigger::Command),
    ExOp::GetIndexed(IndexedTrigger::StateTime),
];

/// First primary byte of the redirection range
pub const REDIRECT_BASE: u8 = 0x58;

/// First primary byte of the hot-trigger range
pub const TRIGGER_BASE: u8 = 0x68;

/// Hot triggers living directly in the primary space
pub static PRIMARY_TRIGGERS: &[Trigger] = &[
    Trigger::Time,
    Trigger::AnimTime,
    Trigger::Anim,
    Trigger::StateNo,
    Trigger::PrevStateNo,
    Trigger::Ctrl,
    Trigger::StateType,
    Trigger::MoveType,
    Trigger::PosX,
    Trigger::PosY,
    Trigger::VelX,
    Trigger::VelY,
    Trigger::Life,
    Trigger::Power,
    Trigger::Alive,
    Trigger::Facing,
    Trigger::Id,
    Trigger::HitPauseTime,
];

/// Decoded primary-space byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primary {
    Op(OpCode),
    Redirect(Redirect),
    Get(Trigger),
}

impl Primary {
    pub fn operand(self) -> Operand {
        match self {
            Primary::Op(op) => op.operand(),
            Primary::Redirect(_) => Operand::Jump32,
            Primary::Get(_) => Operand::None,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Primary::Op(op) => op.mnemonic(),
            Primary::Redirect(r) => r.mnemonic(),
            Primary::Get(t) => t.mnemonic(),
        }
    }
}

pub fn decode_primary(byte: u8) -> Option<Primary> {
    if let Some(op) = OpCode::from_byte(byte) {
        return Some(Primary::Op(op));
    }
    if let Some(offset) = byte.checked_sub(REDIRECT_BASE) {
        if let Some(r) = Redirect::from_byte(offset) {
            return Some(Primary::Redirect(r));
        }
    }
    byte.checked_sub(TRIGGER_BASE)
        .and_then(|i| PRIMARY_TRIGGERS.get(i as usize))
        .map(|&t| Primary::Get(t))
}

pub fn ex_op(space: Space, code: u8) -> Option<ExOp> {
    let table = match space {
        Space::Ex => EX_SPACE,
        Space::Ex2 => EX2_SPACE,
        _ => return None,
    };
    table.get(code as usize).copied()
}

/// Encoding of a trigger getter: primary byte, or escape plus secondary byte
pub fn encode_trigger(trigger: Trigger) -> Option<(u8, Option<u8>)> {
    encode_ex(ExOp::Get(trigger)).or_else(|| {
        PRIMARY_TRIGGERS
            .iter()
            .position(|&t| t == trigger)
            .map(|i| (TRIGGER_BASE + i as u8, None))
    })
}

/// Escape byte and secondary byte of an extended-space entry
pub fn encode_ex(op: ExOp) -> Option<(u8, Option<u8>)> {
    let find = |table: &[ExOp]| table.iter().position(|&e| e == op);
    if let Some(i) = find(EX_SPACE) {
        return Some((OpCode::EscEx as u8, Some(i as u8)));
    }
    find(EX2_SPACE).map(|i| (OpCode::EscEx2 as u8, Some(i as u8)))
}
