use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use crate::parser::{AST, Fragment, ParserContext, WrapperType};

/// Render a number the way Script pushes it: 0..=16 as the bare digit,
/// anything larger as a minimally-encoded little-endian data push.
pub fn push_num(n: u32) -> String {
    if n <= 16 {
        return n.to_string();
    }
    let mut hex = String::new();
    for byte in script_num_bytes(n) {
        hex.push_str(&format!("{:02x}", byte));
    }
    format!("<{}>", hex)
}

// Script number encoding: little-endian, minimal, with a 0x00 sign byte
// when the top byte has its high bit set. Zero is the empty byte string.
fn script_num_bytes(mut n: u32) -> Vec<u8> {
    let mut out = Vec::new();
    while n > 0 {
        out.push((n & 0xff) as u8);
        n >>= 8;
    }
    if let Some(last) = out.last() {
        if last & 0x80 != 0 {
            out.push(0x00);
        }
    }
    out
}

/// Rewrite a script so it leaves nothing on the stack: the final opcode is
/// converted to its VERIFY form where one exists, an existing VERIFY form is
/// kept, and OP_VERIFY is appended otherwise.
pub fn apply_verify(mut script: Vec<String>) -> Vec<String> {
    match script.last().map(String::as_str) {
        Some("OP_CHECKSIG") => {
            let last = script.len() - 1;
            script[last] = String::from("OP_CHECKSIGVERIFY");
        }
        Some("OP_CHECKMULTISIG") => {
            let last = script.len() - 1;
            script[last] = String::from("OP_CHECKMULTISIGVERIFY");
        }
        Some("OP_EQUAL") => {
            let last = script.len() - 1;
            script[last] = String::from("OP_EQUALVERIFY");
        }
        Some("OP_NUMEQUAL") => {
            let last = script.len() - 1;
            script[last] = String::from("OP_NUMEQUALVERIFY");
        }
        Some(
            "OP_VERIFY" | "OP_CHECKSIGVERIFY" | "OP_CHECKMULTISIGVERIFY" | "OP_EQUALVERIFY"
            | "OP_NUMEQUALVERIFY",
        ) => {}
        _ => script.push(String::from("OP_VERIFY")),
    }
    script
}

/// Compile the whole expression to space-separated ASM.
#[inline]
pub fn build_script(ctx: &ParserContext<'_>) -> String {
    build_fragment(ctx, ctx.get_root()).join(" ")
}

fn build_fragment(ctx: &ParserContext<'_>, ast: &AST<'_>) -> Vec<String> {
    match &ast.fragment {
        Fragment::False => vec![String::from("0")],
        Fragment::True => vec![String::from("1")],

        Fragment::PkK { key } => vec![format!("<{}>", key)],
        Fragment::PkH { key } => vec![
            String::from("OP_DUP"),
            String::from("OP_HASH160"),
            format!("<HASH160({})>", key),
            String::from("OP_EQUALVERIFY"),
        ],

        Fragment::Older { n } => {
            vec![push_num(*n), String::from("OP_CHECKSEQUENCEVERIFY")]
        }
        Fragment::After { n } => {
            vec![push_num(*n), String::from("OP_CHECKLOCKTIMEVERIFY")]
        }

        Fragment::Sha256 { h } => hash_fragment("OP_SHA256", h),
        Fragment::Hash256 { h } => hash_fragment("OP_HASH256", h),
        Fragment::Ripemd160 { h } => hash_fragment("OP_RIPEMD160", h),
        Fragment::Hash160 { h } => hash_fragment("OP_HASH160", h),

        Fragment::AndOr { x, y, z } => {
            let mut script = build_fragment(ctx, ctx.get_node(*x));
            script.push(String::from("OP_NOTIF"));
            script.extend(build_fragment(ctx, ctx.get_node(*z)));
            script.push(String::from("OP_ELSE"));
            script.extend(build_fragment(ctx, ctx.get_node(*y)));
            script.push(String::from("OP_ENDIF"));
            script
        }
        Fragment::AndV { x, y } => {
            let mut script = build_fragment(ctx, ctx.get_node(*x));
            script.extend(build_fragment(ctx, ctx.get_node(*y)));
            script
        }
        Fragment::AndB { x, y } => {
            let mut script = build_fragment(ctx, ctx.get_node(*x));
            script.extend(build_fragment(ctx, ctx.get_node(*y)));
            script.push(String::from("OP_BOOLAND"));
            script
        }
        Fragment::OrB { x, z } => {
            let mut script = build_fragment(ctx, ctx.get_node(*x));
            script.extend(build_fragment(ctx, ctx.get_node(*z)));
            script.push(String::from("OP_BOOLOR"));
            script
        }
        Fragment::OrC { x, z } => {
            let mut script = build_fragment(ctx, ctx.get_node(*x));
            script.push(String::from("OP_NOTIF"));
            script.extend(build_fragment(ctx, ctx.get_node(*z)));
            script.push(String::from("OP_ENDIF"));
            script
        }
        Fragment::OrD { x, z } => {
            let mut script = build_fragment(ctx, ctx.get_node(*x));
            script.push(String::from("OP_IFDUP"));
            script.push(String::from("OP_NOTIF"));
            script.extend(build_fragment(ctx, ctx.get_node(*z)));
            script.push(String::from("OP_ENDIF"));
            script
        }
        Fragment::OrI { x, z } => {
            let mut script = vec![String::from("OP_IF")];
            script.extend(build_fragment(ctx, ctx.get_node(*x)));
            script.push(String::from("OP_ELSE"));
            script.extend(build_fragment(ctx, ctx.get_node(*z)));
            script.push(String::from("OP_ENDIF"));
            script
        }

        Fragment::Thresh { k, xs } => {
            let mut script = Vec::new();
            for (i, x) in xs.iter().enumerate() {
                script.extend(build_fragment(ctx, ctx.get_node(*x)));
                if i > 0 {
                    script.push(String::from("OP_ADD"));
                }
            }
            script.push(push_num(*k as u32));
            script.push(String::from("OP_EQUAL"));
            script
        }
        Fragment::Multi { k, keys } => {
            let mut script = vec![push_num(*k as u32)];
            for key in keys {
                script.push(format!("<{}>", key));
            }
            script.push(push_num(keys.len() as u32));
            script.push(String::from("OP_CHECKMULTISIG"));
            script
        }
        Fragment::MultiA { k, keys } => {
            let mut script = Vec::new();
            for (i, key) in keys.iter().enumerate() {
                script.push(format!("<{}>", key));
                if i == 0 {
                    script.push(String::from("OP_CHECKSIG"));
                } else {
                    script.push(String::from("OP_CHECKSIGADD"));
                }
            }
            script.push(push_num(*k as u32));
            script.push(String::from("OP_NUMEQUAL"));
            script
        }

        Fragment::Wrapped { wrapper, x } => {
            let inner = ctx.get_node(*x);
            match wrapper {
                WrapperType::A => {
                    let mut script = vec![String::from("OP_TOALTSTACK")];
                    script.extend(build_fragment(ctx, inner));
                    script.push(String::from("OP_FROMALTSTACK"));
                    script
                }
                WrapperType::S => {
                    let mut script = vec![String::from("OP_SWAP")];
                    script.extend(build_fragment(ctx, inner));
                    script
                }
                WrapperType::C => {
                    let mut script = build_fragment(ctx, inner);
                    script.push(String::from("OP_CHECKSIG"));
                    script
                }
                WrapperType::D => {
                    let mut script = vec![String::from("OP_DUP"), String::from("OP_IF")];
                    script.extend(build_fragment(ctx, inner));
                    script.push(String::from("OP_ENDIF"));
                    script
                }
                WrapperType::V => apply_verify(build_fragment(ctx, inner)),
                WrapperType::J => {
                    let mut script = vec![
                        String::from("OP_SIZE"),
                        String::from("OP_0NOTEQUAL"),
                        String::from("OP_IF"),
                    ];
                    script.extend(build_fragment(ctx, inner));
                    script.push(String::from("OP_ENDIF"));
                    script
                }
                WrapperType::N => {
                    let mut script = build_fragment(ctx, inner);
                    script.push(String::from("OP_0NOTEQUAL"));
                    script
                }
            }
        }
    }
}

fn hash_fragment(opcode: &str, h: &str) -> Vec<String> {
    vec![
        String::from("OP_SIZE"),
        push_num(32),
        String::from("OP_EQUALVERIFY"),
        String::from(opcode),
        format!("<{}>", h),
        String::from("OP_EQUAL"),
    ]
}
