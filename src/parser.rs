use alloc::vec::Vec;

// AST Visitor

pub trait ASTVisitor<'a, T> {
    type Error;

    fn visit_ast(&mut self, ctx: &ParserContext<'a>, node: &AST<'a>) -> Result<T, Self::Error>;

    #[inline]
    fn visit_ast_by_index(
        &mut self,
        ctx: &ParserContext<'a>,
        index: NodeIndex,
    ) -> Result<T, Self::Error> {
        self.visit_ast(ctx, ctx.get_node(index))
    }

    #[inline]
    fn visit(&mut self, ctx: &ParserContext<'a>) -> Result<T, Self::Error> {
        self.visit_ast(ctx, ctx.get_root())
    }
}

// Position
pub type Position = usize;

// AST

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone)]
pub struct AST<'a> {
    pub position: Position,
    pub fragment: Fragment<'a>,
}

pub type NodeIndex = u16;

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone)]
pub enum Fragment<'a> {
    // Basic Fragments
    /// 0
    False,
    /// 1
    True,

    // Key Fragments
    /// pk_k(key)
    PkK {
        key: &'a str,
    },
    /// pk_h(key)
    PkH {
        key: &'a str,
    },

    // Time Fragments
    /// older(n)
    Older {
        n: u32,
    },
    /// after(n)
    After {
        n: u32,
    },

    // Hash Fragments
    /// sha256(h)
    Sha256 {
        h: &'a str,
    },
    /// hash256(h)
    Hash256 {
        h: &'a str,
    },
    /// ripemd160(h)
    Ripemd160 {
        h: &'a str,
    },
    /// hash160(h)
    Hash160 {
        h: &'a str,
    },

    // Logical Fragments
    /// andor(X,Y,Z)
    AndOr {
        x: NodeIndex,
        y: NodeIndex,
        z: NodeIndex,
    },
    /// and_v(X,Y)
    AndV {
        x: NodeIndex,
        y: NodeIndex,
    },
    /// and_b(X,Y)
    AndB {
        x: NodeIndex,
        y: NodeIndex,
    },
    /// or_b(X,Z)
    OrB {
        x: NodeIndex,
        z: NodeIndex,
    },
    /// or_c(X,Z)
    OrC {
        x: NodeIndex,
        z: NodeIndex,
    },
    /// or_d(X,Z)
    OrD {
        x: NodeIndex,
        z: NodeIndex,
    },
    /// or_i(X,Z)
    OrI {
        x: NodeIndex,
        z: NodeIndex,
    },

    // Threshold Fragments
    /// thresh(k,X1,...,Xn)
    Thresh {
        k: usize,
        xs: Vec<NodeIndex>,
    },
    /// multi(k,key1,...,keyn)
    Multi {
        k: usize,
        keys: Vec<&'a str>,
    },
    /// multi_a(k,key1,...,keyn)
    /// (Tapscript only)
    MultiA {
        k: usize,
        keys: Vec<&'a str>,
    },

    /// a: s: c: d: v: j: n:
    Wrapped {
        wrapper: WrapperType,
        x: NodeIndex,
    },
}

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone, Copy, PartialEq)]
pub enum WrapperType {
    A,
    S,
    C,
    D,
    V,
    J,
    N,
}

impl WrapperType {
    pub const fn letter(&self) -> char {
        match self {
            WrapperType::A => 'a',
            WrapperType::S => 's',
            WrapperType::C => 'c',
            WrapperType::D => 'd',
            WrapperType::V => 'v',
            WrapperType::J => 'j',
            WrapperType::N => 'n',
        }
    }
}

// Wrapper alphabet, including the t/l/u sugars expanded at parse time.
const WRAPPER_ALPHABET: &str = "ascdvjntlu";

// Tokenization using string slices with column tracking.
#[inline]
fn split_with_columns<'a, F>(s: &'a str, is_separator: F) -> Vec<(&'a str, Position)>
where
    F: Fn(char) -> bool,
{
    let mut result = Vec::new();
    let mut char_indices = s.char_indices().peekable();
    let mut start = 0;
    let mut column = 1;

    while let Some((i, c)) = char_indices.peek().copied() {
        if is_separator(c) {
            if start < i {
                let part = &s[start..i];
                result.push((part, column));
                column += part.chars().count();
            }

            result.push((&s[i..i + c.len_utf8()], column));
            column += 1;
            char_indices.next();
            start = i + c.len_utf8();
        } else {
            char_indices.next();
        }
    }

    if start < s.len() {
        result.push((&s[start..], column));
    }

    result
}

#[cfg_attr(feature = "debug", derive(Debug))]
pub enum ParseError<'a> {
    UnknownFragment {
        name: &'a str,
        position: Position,
    },
    InvalidWrapper {
        found: char,
        position: Position,
    },
    BadArity {
        fragment: &'static str,
        position: Position,
    },
    MalformedExpression {
        expected: &'static str,
        found: Option<(&'a str, Position)>,
    },
}

#[derive(Clone)]
pub struct ParserContext<'a> {
    tokens: Vec<(&'a str, Position)>,
    current_token: usize,
    nodes: Vec<AST<'a>>,

    root: Option<AST<'a>>,
}

impl<'a> ParserContext<'a> {
    #[inline]
    fn new(input: &'a str) -> Self {
        let tokens = split_with_columns(input, |c| c == '(' || c == ')' || c == ',' || c == ':');
        Self {
            tokens,
            current_token: 0,
            nodes: Vec::new(),
            root: None,
        }
    }

    #[inline]
    fn next_token(&mut self) -> Option<(&'a str, Position)> {
        if self.current_token < self.tokens.len() {
            let token = self.tokens[self.current_token];
            self.current_token += 1;
            Some(token)
        } else {
            None
        }
    }

    #[inline]
    fn peek_token(&self) -> Option<(&'a str, Position)> {
        self.tokens.get(self.current_token).copied()
    }

    #[inline]
    fn peek_next_token(&self) -> Option<(&'a str, Position)> {
        self.tokens.get(self.current_token + 1).copied()
    }

    #[inline]
    fn add_node(&mut self, ast: AST<'a>) -> NodeIndex {
        let index = self.nodes.len() as NodeIndex;
        self.nodes.push(ast);
        index
    }

    #[inline]
    pub fn get_node(&self, index: NodeIndex) -> &AST<'a> {
        &self.nodes[index as usize]
    }

    #[inline]
    pub fn get_root(&self) -> &AST<'a> {
        self.root.as_ref().expect("root node not found")
    }

    /// Satisfy the expression, enumerating all witnesses.
    #[inline]
    #[cfg(feature = "satisfy")]
    pub fn satisfy(
        &self,
        options: &crate::satisfy::SatisfyOptions,
    ) -> Result<crate::satisfy::Satisfied, crate::satisfy::SatisfyError> {
        crate::satisfy::satisfy_ast(self, options)
    }

    /// Serialize the AST back to canonical (sugar-free) text.
    #[inline]
    pub fn serialize(&self) -> alloc::string::String {
        let mut serializer = crate::serialize::Serializer::new();
        serializer.serialize(self)
    }
}

#[inline]
pub fn parse<'a>(input: &'a str) -> Result<ParserContext<'a>, ParseError<'a>> {
    // Whitespace is only trimmed at the outer boundary.
    let mut ctx = ParserContext::new(input.trim());

    let root = parse_internal(&mut ctx)?;
    ctx.root = Some(root);

    // should be no more tokens
    if let Some(found) = ctx.peek_token() {
        return Err(ParseError::MalformedExpression {
            expected: "end of input",
            found: Some(found),
        });
    }

    Ok(ctx)
}

#[inline]
fn expect_token<'a>(
    ctx: &mut ParserContext<'a>,
    expected: &'static str,
) -> Result<(&'a str, Position), ParseError<'a>> {
    let found = ctx.next_token();
    match found {
        Some((token, column)) if token == expected => Ok((token, column)),
        _ => Err(ParseError::MalformedExpression { expected, found }),
    }
}

// ")" closing a fixed-arity fragment; a "," here means too many arguments.
#[inline]
fn expect_close<'a>(
    ctx: &mut ParserContext<'a>,
    fragment: &'static str,
) -> Result<(), ParseError<'a>> {
    match ctx.next_token() {
        Some((")", _)) => Ok(()),
        Some((",", column)) => Err(ParseError::BadArity {
            fragment,
            position: column,
        }),
        found => Err(ParseError::MalformedExpression {
            expected: ")",
            found,
        }),
    }
}

// "," between fixed-arity arguments; a ")" here means too few arguments.
#[inline]
fn expect_comma<'a>(
    ctx: &mut ParserContext<'a>,
    fragment: &'static str,
) -> Result<(), ParseError<'a>> {
    match ctx.next_token() {
        Some((",", _)) => Ok(()),
        Some((")", column)) => Err(ParseError::BadArity {
            fragment,
            position: column,
        }),
        found => Err(ParseError::MalformedExpression {
            expected: ",",
            found,
        }),
    }
}

// A scalar argument (key name, hash digest, number). Delimiters are not
// scalars; an immediate ")" means the argument list is short.
#[inline]
fn expect_scalar<'a>(
    ctx: &mut ParserContext<'a>,
    fragment: &'static str,
) -> Result<(&'a str, Position), ParseError<'a>> {
    match ctx.next_token() {
        Some((")", column)) => Err(ParseError::BadArity {
            fragment,
            position: column,
        }),
        Some((token, column)) if token != "(" && token != "," && token != ":" => {
            Ok((token, column))
        }
        found => Err(ParseError::MalformedExpression {
            expected: "argument",
            found,
        }),
    }
}

#[inline]
fn expect_number<'a>(
    ctx: &mut ParserContext<'a>,
    fragment: &'static str,
) -> Result<(u32, Position), ParseError<'a>> {
    let (token, column) = expect_scalar(ctx, fragment)?;

    // No sign, no leading zeros.
    if token.len() > 1 && token.starts_with('0') {
        return Err(ParseError::MalformedExpression {
            expected: "decimal integer",
            found: Some((token, column)),
        });
    }
    let n = token
        .parse::<u32>()
        .map_err(|_| ParseError::MalformedExpression {
            expected: "decimal integer",
            found: Some((token, column)),
        })?;
    Ok((n, column))
}

fn parse_scalar_fragment<'a>(
    ctx: &mut ParserContext<'a>,
    fragment: &'static str,
) -> Result<(&'a str, Position), ParseError<'a>> {
    expect_token(ctx, "(")?;
    let value = expect_scalar(ctx, fragment)?;
    expect_close(ctx, fragment)?;
    Ok(value)
}

fn parse_binary<'a>(
    ctx: &mut ParserContext<'a>,
    fragment: &'static str,
) -> Result<(NodeIndex, NodeIndex), ParseError<'a>> {
    expect_token(ctx, "(")?;
    let x = parse_internal(ctx)?;
    expect_comma(ctx, fragment)?;
    let y = parse_internal(ctx)?;
    expect_close(ctx, fragment)?;
    Ok((ctx.add_node(x), ctx.add_node(y)))
}

fn parse_key_list<'a>(
    ctx: &mut ParserContext<'a>,
    fragment: &'static str,
) -> Result<(usize, Vec<&'a str>, Position), ParseError<'a>> {
    expect_token(ctx, "(")?;
    let (k, column) = expect_number(ctx, fragment)?;

    let mut keys = Vec::new();
    while let Some((",", _)) = ctx.peek_token() {
        ctx.next_token();
        let (key, _key_column) = expect_scalar(ctx, fragment)?;
        keys.push(key);
    }
    expect_token(ctx, ")")?;

    Ok((k as usize, keys, column))
}

fn parse_internal<'a>(ctx: &mut ParserContext<'a>) -> Result<AST<'a>, ParseError<'a>> {
    let (token, column) = ctx.peek_token().ok_or(ParseError::MalformedExpression {
        expected: "expression",
        found: None,
    })?;

    // A wrapper prefix is a token of wrapper letters followed by ":".
    if let Some((":", _)) = ctx.peek_next_token() {
        return parse_wrapped(ctx, (token, column));
    }

    ctx.next_token(); // Advance past the fragment name

    match token {
        "0" => Ok(AST {
            position: column,
            fragment: Fragment::False,
        }),
        "1" => Ok(AST {
            position: column,
            fragment: Fragment::True,
        }),

        "pk_k" => {
            let (key, _) = parse_scalar_fragment(ctx, "pk_k")?;
            Ok(AST {
                position: column,
                fragment: Fragment::PkK { key },
            })
        }
        "pk_h" => {
            let (key, _) = parse_scalar_fragment(ctx, "pk_h")?;
            Ok(AST {
                position: column,
                fragment: Fragment::PkH { key },
            })
        }
        "pk" => {
            // pk(key) = c:pk_k(key)
            let (key, _) = parse_scalar_fragment(ctx, "pk")?;
            let inner = AST {
                position: column,
                fragment: Fragment::PkK { key },
            };
            Ok(AST {
                position: column,
                fragment: Fragment::Wrapped {
                    wrapper: WrapperType::C,
                    x: ctx.add_node(inner),
                },
            })
        }
        "pkh" => {
            // pkh(key) = c:pk_h(key)
            let (key, _) = parse_scalar_fragment(ctx, "pkh")?;
            let inner = AST {
                position: column,
                fragment: Fragment::PkH { key },
            };
            Ok(AST {
                position: column,
                fragment: Fragment::Wrapped {
                    wrapper: WrapperType::C,
                    x: ctx.add_node(inner),
                },
            })
        }

        "older" => {
            expect_token(ctx, "(")?;
            let (n, _) = expect_number(ctx, "older")?;
            expect_close(ctx, "older")?;
            Ok(AST {
                position: column,
                fragment: Fragment::Older { n },
            })
        }
        "after" => {
            expect_token(ctx, "(")?;
            let (n, _) = expect_number(ctx, "after")?;
            expect_close(ctx, "after")?;
            Ok(AST {
                position: column,
                fragment: Fragment::After { n },
            })
        }

        "sha256" => {
            let (h, _) = parse_scalar_fragment(ctx, "sha256")?;
            Ok(AST {
                position: column,
                fragment: Fragment::Sha256 { h },
            })
        }
        "hash256" => {
            let (h, _) = parse_scalar_fragment(ctx, "hash256")?;
            Ok(AST {
                position: column,
                fragment: Fragment::Hash256 { h },
            })
        }
        "ripemd160" => {
            let (h, _) = parse_scalar_fragment(ctx, "ripemd160")?;
            Ok(AST {
                position: column,
                fragment: Fragment::Ripemd160 { h },
            })
        }
        "hash160" => {
            let (h, _) = parse_scalar_fragment(ctx, "hash160")?;
            Ok(AST {
                position: column,
                fragment: Fragment::Hash160 { h },
            })
        }

        "andor" => {
            expect_token(ctx, "(")?;
            let x = parse_internal(ctx)?;
            expect_comma(ctx, "andor")?;
            let y = parse_internal(ctx)?;
            expect_comma(ctx, "andor")?;
            let z = parse_internal(ctx)?;
            expect_close(ctx, "andor")?;
            Ok(AST {
                position: column,
                fragment: Fragment::AndOr {
                    x: ctx.add_node(x),
                    y: ctx.add_node(y),
                    z: ctx.add_node(z),
                },
            })
        }

        "and_v" => {
            let (x, y) = parse_binary(ctx, "and_v")?;
            Ok(AST {
                position: column,
                fragment: Fragment::AndV { x, y },
            })
        }
        "and_b" => {
            let (x, y) = parse_binary(ctx, "and_b")?;
            Ok(AST {
                position: column,
                fragment: Fragment::AndB { x, y },
            })
        }
        "and_n" => {
            // and_n(X,Y) = andor(X,Y,0)
            let (x, y) = parse_binary(ctx, "and_n")?;
            let z = ctx.add_node(AST {
                position: column,
                fragment: Fragment::False,
            });
            Ok(AST {
                position: column,
                fragment: Fragment::AndOr { x, y, z },
            })
        }

        "or_b" => {
            let (x, z) = parse_binary(ctx, "or_b")?;
            Ok(AST {
                position: column,
                fragment: Fragment::OrB { x, z },
            })
        }
        "or_c" => {
            let (x, z) = parse_binary(ctx, "or_c")?;
            Ok(AST {
                position: column,
                fragment: Fragment::OrC { x, z },
            })
        }
        "or_d" => {
            let (x, z) = parse_binary(ctx, "or_d")?;
            Ok(AST {
                position: column,
                fragment: Fragment::OrD { x, z },
            })
        }
        "or_i" => {
            let (x, z) = parse_binary(ctx, "or_i")?;
            Ok(AST {
                position: column,
                fragment: Fragment::OrI { x, z },
            })
        }

        "thresh" => {
            expect_token(ctx, "(")?;
            let (k, _) = expect_number(ctx, "thresh")?;

            let mut xs = Vec::new();
            while let Some((",", _)) = ctx.peek_token() {
                ctx.next_token();
                let x = parse_internal(ctx)?;
                xs.push(ctx.add_node(x));
            }
            expect_token(ctx, ")")?;

            Ok(AST {
                position: column,
                fragment: Fragment::Thresh {
                    k: k as usize,
                    xs,
                },
            })
        }

        "multi" => {
            let (k, keys, _) = parse_key_list(ctx, "multi")?;
            Ok(AST {
                position: column,
                fragment: Fragment::Multi { k, keys },
            })
        }
        "multi_a" => {
            let (k, keys, _) = parse_key_list(ctx, "multi_a")?;
            Ok(AST {
                position: column,
                fragment: Fragment::MultiA { k, keys },
            })
        }

        name => Err(ParseError::UnknownFragment {
            name,
            position: column,
        }),
    }
}

fn parse_wrapped<'a>(
    ctx: &mut ParserContext<'a>,
    letters: (&'a str, Position),
) -> Result<AST<'a>, ParseError<'a>> {
    let (letters, column) = letters;

    // All letters must come from the wrapper alphabet before anything is
    // consumed; a stray letter fails the whole prefix.
    for ch in letters.chars() {
        if !WRAPPER_ALPHABET.contains(ch) {
            return Err(ParseError::InvalidWrapper {
                found: ch,
                position: column,
            });
        }
    }

    ctx.next_token(); // Advance past the wrapper letters
    ctx.next_token(); // Advance past ":"

    // "::" is not a wrapper sequence
    if let Some((":", colon_column)) = ctx.peek_token() {
        return Err(ParseError::InvalidWrapper {
            found: ':',
            position: colon_column,
        });
    }

    let mut node = parse_internal(ctx)?;

    // Rewrap in reverse so the leftmost letter becomes the outermost node.
    for ch in letters.chars().rev() {
        node = match ch {
            'a' | 's' | 'c' | 'd' | 'v' | 'j' | 'n' => {
                let wrapper = match ch {
                    'a' => WrapperType::A,
                    's' => WrapperType::S,
                    'c' => WrapperType::C,
                    'd' => WrapperType::D,
                    'v' => WrapperType::V,
                    'j' => WrapperType::J,
                    _ => WrapperType::N,
                };
                AST {
                    position: column,
                    fragment: Fragment::Wrapped {
                        wrapper,
                        x: ctx.add_node(node),
                    },
                }
            }
            't' => {
                // t:X = and_v(X,1)
                let y = ctx.add_node(AST {
                    position: column,
                    fragment: Fragment::True,
                });
                AST {
                    position: column,
                    fragment: Fragment::AndV {
                        x: ctx.add_node(node),
                        y,
                    },
                }
            }
            'l' => {
                // l:X = or_i(0,X)
                let x = ctx.add_node(AST {
                    position: column,
                    fragment: Fragment::False,
                });
                AST {
                    position: column,
                    fragment: Fragment::OrI {
                        x,
                        z: ctx.add_node(node),
                    },
                }
            }
            _ => {
                // u:X = or_i(X,0)
                let z = ctx.add_node(AST {
                    position: column,
                    fragment: Fragment::False,
                });
                AST {
                    position: column,
                    fragment: Fragment::OrI {
                        x: ctx.add_node(node),
                        z,
                    },
                }
            }
        };
    }

    Ok(node)
}
