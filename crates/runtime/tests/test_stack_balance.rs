//! Stack balance over generated programs
//!
//! Random expressions built only from arity-respecting pieces must always
//! evaluate to exactly one value and leave the machine empty, whatever soft
//! faults happen along the way.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statevm_runtime::{
    Assembler, CharId, CharSpec, IndexedTrigger, Machine, OpCode, Program, RecordingSink,
    Redirect, Sandbox, SetOp, Trigger, VarKind, VmConfig, verify,
};

const P1: CharId = CharId(1);

const UNARY: &[OpCode] = &[
    OpCode::Neg,
    OpCode::BlNot,
    OpCode::Not,
    OpCode::Abs,
    OpCode::Exp,
    OpCode::Ln,
    OpCode::Sqrt,
    OpCode::Sin,
    OpCode::Cos,
    OpCode::Tan,
    OpCode::Asin,
    OpCode::Acos,
    OpCode::Atan,
    OpCode::Floor,
    OpCode::Ceil,
];

const BINARY: &[OpCode] = &[
    OpCode::Eq,
    OpCode::Ne,
    OpCode::Gt,
    OpCode::Ge,
    OpCode::Lt,
    OpCode::Le,
    OpCode::BlAnd,
    OpCode::BlOr,
    OpCode::BlXor,
    OpCode::And,
    OpCode::Or,
    OpCode::Xor,
    OpCode::Add,
    OpCode::Sub,
    OpCode::Mul,
    OpCode::Div,
    OpCode::Mod,
    OpCode::Pow,
    OpCode::Log,
    OpCode::Min,
    OpCode::Max,
];

const VARS: &[VarKind] = &[
    VarKind::Int,
    VarKind::Float,
    VarKind::SysInt,
    VarKind::SysFloat,
];

struct Gen {
    rng: StdRng,
}

impl Gen {
    fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        items[self.rng.gen_range(0..items.len())]
    }

    /// Emit code that nets exactly one value
    fn expr(&mut self, a: &mut Assembler, depth: u32) {
        if depth == 0 || self.rng.gen_bool(0.25) {
            self.leaf(a);
            return;
        }
        let depth = depth - 1;
        match self.rng.gen_range(0..9) {
            0 => {
                self.expr(a, depth);
                let op = self.pick(UNARY);
                a.op(op);
            }
            1 | 2 => {
                self.expr(a, depth);
                self.expr(a, depth);
                let op = self.pick(BINARY);
                a.op(op);
            }
            3 => {
                self.expr(a, depth);
                self.expr(a, depth);
                self.expr(a, depth);
                a.op(OpCode::IfElse);
            }
            4 => {
                // short-circuit && / ||
                let end = a.label();
                self.expr(a, depth);
                let op = self.pick(&[OpCode::Jz, OpCode::Jnz, OpCode::Jz8, OpCode::Jnz8]);
                let op = if depth > 1 && matches!(op, OpCode::Jz8 | OpCode::Jnz8) {
                    OpCode::Jz
                } else {
                    op
                };
                a.jump(op, end).op(OpCode::Pop);
                self.expr(a, depth);
                a.bind(end);
            }
            5 => {
                let fail = a.label();
                match self.rng.gen_range(0..3) {
                    0 => {
                        let id = self.pick(&[1, 2, 3, 99]);
                        a.int(id).redirect(Redirect::PlayerId, fail);
                    }
                    1 => {
                        a.redirect(Redirect::Parent, fail);
                    }
                    _ => {
                        let n = self.rng.gen_range(-1..3);
                        a.int(n).redirect(Redirect::Enemy, fail);
                    }
                }
                self.expr(a, depth);
                a.bind(fail);
            }
            6 => {
                let mut sub = Assembler::new();
                self.expr(&mut sub, depth);
                let sub = sub.finish().unwrap();
                if self.rng.gen_bool(0.5) {
                    a.run(&sub);
                } else {
                    a.run_original(&sub);
                }
            }
            7 => {
                let index = self.rng.gen_range(-1..8);
                a.int(index);
                self.expr(a, depth);
                let op = self.pick(&[
                    SetOp::Var,
                    SetOp::FVar,
                    SetOp::SysVar,
                    SetOp::SysFVar,
                    SetOp::VarAdd,
                    SetOp::FVarAdd,
                ]);
                a.set(op);
            }
            _ => {
                let local = self.rng.gen_range(0..4);
                self.expr(a, depth);
                if self.rng.gen_bool(0.5) {
                    a.set_local(local);
                } else {
                    a.op(OpCode::Dup).op(OpCode::Pop).add_local(local);
                }
            }
        }
    }

    fn leaf(&mut self, a: &mut Assembler) {
        match self.rng.gen_range(0..9) {
            0 => {
                let v = self.rng.gen_range(-300..300);
                a.int(v);
            }
            1 => {
                let v: i32 = self.rng.gen_range(-1000..1000);
                a.int(v * 1000);
            }
            2 => {
                let v = self.rng.gen_range(-4.0f32..4.0);
                a.float(v);
            }
            3 => {
                a.sfalse();
            }
            4 => {
                let t = self.pick(Trigger::ALL);
                a.trigger(t);
            }
            5 => {
                let t = self.pick(IndexedTrigger::ALL);
                let arg = self.rng.gen_range(0..3);
                a.int(arg).indexed(t);
            }
            6 => {
                let kind = self.pick(VARS);
                let index = self.rng.gen_range(-1..70);
                a.int(index).var(kind);
            }
            7 => {
                let local = self.rng.gen_range(0..4);
                a.local(local);
            }
            _ => {
                a.op(OpCode::Random);
            }
        }
    }

    fn program(&mut self, depth: u32) -> Program {
        let mut asm = Assembler::new();
        self.expr(&mut asm, depth);
        asm.finish().unwrap()
    }
}

fn sandbox(seed: u64) -> Sandbox {
    let mut w = Sandbox::new(seed);
    w.add_char(CharSpec::player(1, 1));
    w.add_char(CharSpec::player(2, 2));
    w.add_char(CharSpec::helper(3, 1, 7));
    w
}

#[test]
fn test_generated_programs_net_one_value() {
    let mut generator = Gen {
        rng: StdRng::seed_from_u64(0x5eed),
    };
    let sink = RecordingSink::new();
    let mut m = Machine::with_sink(VmConfig::default(), sink.clone());
    let mut w = sandbox(3);

    for round in 0..500 {
        let depth = 1 + round % 6;
        let program = generator.program(depth);
        verify(&program).unwrap_or_else(|e| panic!("round {}: {} in {:?}", round, e, program));

        let result = m.eval_with_locals(&mut w, P1, &program, 4);
        assert!(
            result.is_ok(),
            "round {}: {:?} for {:?}",
            round,
            result,
            program
        );
        assert!(m.stack().is_empty(), "round {}: stack left over", round);
        assert_eq!(m.arena().depth(), 0, "round {}: frame left over", round);
        sink.take();
    }
}

#[test]
fn test_generation_is_reproducible() {
    let mut a = Gen {
        rng: StdRng::seed_from_u64(17),
    };
    let mut b = Gen {
        rng: StdRng::seed_from_u64(17),
    };
    for depth in 1..5 {
        assert_eq!(a.program(depth).as_bytes(), b.program(depth).as_bytes());
    }
}
