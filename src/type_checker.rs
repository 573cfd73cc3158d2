use alloc::vec::Vec;

use crate::limits;
use crate::parser::{AST, ASTVisitor, Fragment, ParserContext, Position, WrapperType};

// Miniscript Types

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone, Copy, PartialEq)]
pub enum MiniscriptType {
    B, // Base
    V, // Verify
    K, // Key
    W, // Wrapped
}

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone, Copy, PartialEq)]
pub enum Property {
    /// Consumes exactly 0 stack elements
    Z,
    /// Consumes exactly 1 stack element
    O,
    /// No satisfaction with an all-zero top input
    N,
    /// A dissatisfaction exists
    D,
    /// Leaves exactly 0 or 1 on the stack
    U,
}

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone)]
pub struct TypeInfo {
    base_type: MiniscriptType,
    properties: Vec<Property>,
}

impl TypeInfo {
    pub fn new(base_type: MiniscriptType, properties: Vec<Property>) -> Self {
        Self {
            base_type,
            properties,
        }
    }

    pub fn base_type(&self) -> MiniscriptType {
        self.base_type
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn has_property(&self, property: Property) -> bool {
        self.properties.contains(&property)
    }
}

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone)]
pub enum TypeError {
    ChildBase1 {
        wrapper: char,
        found: MiniscriptType,
        position: Position,
    },
    ChildBase2 {
        fragment: &'static str,
        found: MiniscriptType,
        position: Position,
    },
    ChildBase3 {
        found: MiniscriptType,
        position: Position,
    },
    SwapNonOne {
        position: Position,
    },
    NonZeroDupIf {
        position: Position,
    },
    NonZeroZero {
        position: Position,
    },
    LeftNotDissatisfiable {
        fragment: &'static str,
        position: Position,
    },
    RightNotDissatisfiable {
        fragment: &'static str,
        position: Position,
    },
    LeftNotUnit {
        fragment: &'static str,
        position: Position,
    },
    ThresholdBase {
        index: usize,
        found: MiniscriptType,
        position: Position,
    },
    ThresholdNonUnit {
        index: usize,
        position: Position,
    },
    ThresholdDissat {
        index: usize,
        position: Position,
    },
    OutOfRange {
        fragment: &'static str,
        value: u32,
        position: Position,
    },
    ContextMismatch {
        fragment: &'static str,
        position: Position,
    },
}

// Type Checker

pub struct CorrectnessVisitor {
    tapscript: bool,
}

impl CorrectnessVisitor {
    pub fn new(tapscript: bool) -> Self {
        Self { tapscript }
    }
}

fn check_threshold(
    fragment: &'static str,
    k: usize,
    n: usize,
    position: Position,
) -> Result<(), TypeError> {
    if k < 1 || k > n {
        return Err(TypeError::OutOfRange {
            fragment,
            value: k as u32,
            position,
        });
    }
    Ok(())
}

impl<'a> ASTVisitor<'a, TypeInfo> for CorrectnessVisitor {
    type Error = TypeError;

    fn visit_ast(&mut self, ctx: &ParserContext<'a>, node: &AST<'a>) -> Result<TypeInfo, TypeError> {
        match &node.fragment {
            Fragment::False => Ok(type_info!(B, "zdu")),
            Fragment::True => Ok(type_info!(B, "zu")),

            Fragment::PkK { .. } => Ok(type_info!(K, "ondu")),
            Fragment::PkH { .. } => Ok(type_info!(K, "ndu")),

            Fragment::Older { n } | Fragment::After { n } => {
                let fragment = match &node.fragment {
                    Fragment::Older { .. } => "older",
                    _ => "after",
                };
                if limits::check_locktime_value(*n).is_err() {
                    return Err(TypeError::OutOfRange {
                        fragment,
                        value: *n,
                        position: node.position,
                    });
                }
                Ok(type_info!(B, "z"))
            }

            Fragment::Sha256 { .. }
            | Fragment::Hash256 { .. }
            | Fragment::Ripemd160 { .. }
            | Fragment::Hash160 { .. } => Ok(type_info!(B, "ondu")),

            Fragment::AndOr { x, y, z } => {
                // X is Bdu; Y and Z are both B, K, or V
                let x_type = self.visit_ast_by_index(ctx, *x)?;
                let y_type = self.visit_ast_by_index(ctx, *y)?;
                let z_type = self.visit_ast_by_index(ctx, *z)?;

                if x_type.base_type() != MiniscriptType::B {
                    return Err(TypeError::ChildBase3 {
                        found: x_type.base_type(),
                        position: node.position,
                    });
                }
                if !x_type.has_property(Property::D) {
                    return Err(TypeError::LeftNotDissatisfiable {
                        fragment: "andor",
                        position: node.position,
                    });
                }
                if !x_type.has_property(Property::U) {
                    return Err(TypeError::LeftNotUnit {
                        fragment: "andor",
                        position: node.position,
                    });
                }
                if y_type.base_type() != z_type.base_type()
                    || y_type.base_type() == MiniscriptType::W
                {
                    return Err(TypeError::ChildBase3 {
                        found: y_type.base_type(),
                        position: node.position,
                    });
                }

                // properties: z=zXzYzZ; o=zXoYoZ or oXzYzZ; u=uYuZ; d=dZ
                let mut properties = Vec::new();
                if x_type.has_property(Property::Z)
                    && y_type.has_property(Property::Z)
                    && z_type.has_property(Property::Z)
                {
                    properties.push(Property::Z);
                }
                if (x_type.has_property(Property::Z)
                    && y_type.has_property(Property::O)
                    && z_type.has_property(Property::O))
                    || (x_type.has_property(Property::O)
                        && y_type.has_property(Property::Z)
                        && z_type.has_property(Property::Z))
                {
                    properties.push(Property::O);
                }
                if y_type.has_property(Property::U) && z_type.has_property(Property::U) {
                    properties.push(Property::U);
                }
                if z_type.has_property(Property::D) {
                    properties.push(Property::D);
                }

                Ok(TypeInfo::new(y_type.base_type(), properties))
            }

            Fragment::AndV { x, y } => {
                // X is V; Y is B, K, or V
                let x_type = self.visit_ast_by_index(ctx, *x)?;
                let y_type = self.visit_ast_by_index(ctx, *y)?;

                if x_type.base_type() != MiniscriptType::V {
                    return Err(TypeError::ChildBase2 {
                        fragment: "and_v",
                        found: x_type.base_type(),
                        position: node.position,
                    });
                }
                if y_type.base_type() == MiniscriptType::W {
                    return Err(TypeError::ChildBase2 {
                        fragment: "and_v",
                        found: y_type.base_type(),
                        position: node.position,
                    });
                }

                // properties: z=zXzY; o=zXoY or oXzY; n=nX or zXnY; u=uY
                let mut properties = Vec::new();
                if x_type.has_property(Property::Z) && y_type.has_property(Property::Z) {
                    properties.push(Property::Z);
                }
                if (x_type.has_property(Property::Z) && y_type.has_property(Property::O))
                    || (x_type.has_property(Property::O) && y_type.has_property(Property::Z))
                {
                    properties.push(Property::O);
                }
                if x_type.has_property(Property::N)
                    || (x_type.has_property(Property::Z) && y_type.has_property(Property::N))
                {
                    properties.push(Property::N);
                }
                if y_type.has_property(Property::U) {
                    properties.push(Property::U);
                }

                Ok(TypeInfo::new(y_type.base_type(), properties))
            }

            Fragment::AndB { x, y } => {
                // X is B; Y is W
                let x_type = self.visit_ast_by_index(ctx, *x)?;
                let y_type = self.visit_ast_by_index(ctx, *y)?;

                if x_type.base_type() != MiniscriptType::B {
                    return Err(TypeError::ChildBase2 {
                        fragment: "and_b",
                        found: x_type.base_type(),
                        position: node.position,
                    });
                }
                if y_type.base_type() != MiniscriptType::W {
                    return Err(TypeError::ChildBase2 {
                        fragment: "and_b",
                        found: y_type.base_type(),
                        position: node.position,
                    });
                }

                // properties: z=zXzY; o=zXoY or oXzY; n=nX or zXnY; d=dXdY; u
                let mut properties = Vec::new();
                if x_type.has_property(Property::Z) && y_type.has_property(Property::Z) {
                    properties.push(Property::Z);
                }
                if (x_type.has_property(Property::Z) && y_type.has_property(Property::O))
                    || (x_type.has_property(Property::O) && y_type.has_property(Property::Z))
                {
                    properties.push(Property::O);
                }
                if x_type.has_property(Property::N)
                    || (x_type.has_property(Property::Z) && y_type.has_property(Property::N))
                {
                    properties.push(Property::N);
                }
                if x_type.has_property(Property::D) && y_type.has_property(Property::D) {
                    properties.push(Property::D);
                }
                properties.push(Property::U);

                Ok(TypeInfo::new(MiniscriptType::B, properties))
            }

            Fragment::OrB { x, z } => {
                // X is Bd; Z is Wd
                let x_type = self.visit_ast_by_index(ctx, *x)?;
                let z_type = self.visit_ast_by_index(ctx, *z)?;

                if x_type.base_type() != MiniscriptType::B {
                    return Err(TypeError::ChildBase2 {
                        fragment: "or_b",
                        found: x_type.base_type(),
                        position: node.position,
                    });
                }
                if !x_type.has_property(Property::D) {
                    return Err(TypeError::LeftNotDissatisfiable {
                        fragment: "or_b",
                        position: node.position,
                    });
                }
                if z_type.base_type() != MiniscriptType::W {
                    return Err(TypeError::ChildBase2 {
                        fragment: "or_b",
                        found: z_type.base_type(),
                        position: node.position,
                    });
                }
                if !z_type.has_property(Property::D) {
                    return Err(TypeError::RightNotDissatisfiable {
                        fragment: "or_b",
                        position: node.position,
                    });
                }

                // properties: z=zXzZ; o=zXoZ or oXzZ; d; u
                let mut properties = Vec::new();
                if x_type.has_property(Property::Z) && z_type.has_property(Property::Z) {
                    properties.push(Property::Z);
                }
                if (x_type.has_property(Property::Z) && z_type.has_property(Property::O))
                    || (x_type.has_property(Property::O) && z_type.has_property(Property::Z))
                {
                    properties.push(Property::O);
                }
                properties.push(Property::D);
                properties.push(Property::U);

                Ok(TypeInfo::new(MiniscriptType::B, properties))
            }

            Fragment::OrC { x, z } => {
                // X is Bdu; Z is V
                let x_type = self.visit_ast_by_index(ctx, *x)?;
                let z_type = self.visit_ast_by_index(ctx, *z)?;

                if x_type.base_type() != MiniscriptType::B {
                    return Err(TypeError::ChildBase2 {
                        fragment: "or_c",
                        found: x_type.base_type(),
                        position: node.position,
                    });
                }
                if !x_type.has_property(Property::D) {
                    return Err(TypeError::LeftNotDissatisfiable {
                        fragment: "or_c",
                        position: node.position,
                    });
                }
                if !x_type.has_property(Property::U) {
                    return Err(TypeError::LeftNotUnit {
                        fragment: "or_c",
                        position: node.position,
                    });
                }
                if z_type.base_type() != MiniscriptType::V {
                    return Err(TypeError::ChildBase2 {
                        fragment: "or_c",
                        found: z_type.base_type(),
                        position: node.position,
                    });
                }

                // properties: z=zXzZ; o=oXzZ
                let mut properties = Vec::new();
                if x_type.has_property(Property::Z) && z_type.has_property(Property::Z) {
                    properties.push(Property::Z);
                }
                if x_type.has_property(Property::O) && z_type.has_property(Property::Z) {
                    properties.push(Property::O);
                }

                Ok(TypeInfo::new(MiniscriptType::V, properties))
            }

            Fragment::OrD { x, z } => {
                // X is Bdu; Z is B
                let x_type = self.visit_ast_by_index(ctx, *x)?;
                let z_type = self.visit_ast_by_index(ctx, *z)?;

                if x_type.base_type() != MiniscriptType::B {
                    return Err(TypeError::ChildBase2 {
                        fragment: "or_d",
                        found: x_type.base_type(),
                        position: node.position,
                    });
                }
                if !x_type.has_property(Property::D) {
                    return Err(TypeError::LeftNotDissatisfiable {
                        fragment: "or_d",
                        position: node.position,
                    });
                }
                if !x_type.has_property(Property::U) {
                    return Err(TypeError::LeftNotUnit {
                        fragment: "or_d",
                        position: node.position,
                    });
                }
                if z_type.base_type() != MiniscriptType::B {
                    return Err(TypeError::ChildBase2 {
                        fragment: "or_d",
                        found: z_type.base_type(),
                        position: node.position,
                    });
                }

                // properties: z=zXzZ; o=oXzZ; d=dZ; u=uZ
                let mut properties = Vec::new();
                if x_type.has_property(Property::Z) && z_type.has_property(Property::Z) {
                    properties.push(Property::Z);
                }
                if x_type.has_property(Property::O) && z_type.has_property(Property::Z) {
                    properties.push(Property::O);
                }
                if z_type.has_property(Property::D) {
                    properties.push(Property::D);
                }
                if z_type.has_property(Property::U) {
                    properties.push(Property::U);
                }

                Ok(TypeInfo::new(MiniscriptType::B, properties))
            }

            Fragment::OrI { x, z } => {
                // X and Z are both B, K, or V
                let x_type = self.visit_ast_by_index(ctx, *x)?;
                let z_type = self.visit_ast_by_index(ctx, *z)?;

                if x_type.base_type() != z_type.base_type()
                    || x_type.base_type() == MiniscriptType::W
                {
                    return Err(TypeError::ChildBase2 {
                        fragment: "or_i",
                        found: x_type.base_type(),
                        position: node.position,
                    });
                }

                // properties: o=zXzZ; u=uXuZ; d=dX or dZ
                let mut properties = Vec::new();
                if x_type.has_property(Property::Z) && z_type.has_property(Property::Z) {
                    properties.push(Property::O);
                }
                if x_type.has_property(Property::U) && z_type.has_property(Property::U) {
                    properties.push(Property::U);
                }
                if x_type.has_property(Property::D) || z_type.has_property(Property::D) {
                    properties.push(Property::D);
                }

                Ok(TypeInfo::new(x_type.base_type(), properties))
            }

            Fragment::Thresh { k, xs } => {
                // 1 <= k <= n; X1 is Bdu; the rest are Wdu
                check_threshold("thresh", *k, xs.len(), node.position)?;

                let mut sub_types = Vec::new();
                for x in xs {
                    sub_types.push(self.visit_ast_by_index(ctx, *x)?);
                }

                for (i, x_type) in sub_types.iter().enumerate() {
                    let expected = if i == 0 {
                        MiniscriptType::B
                    } else {
                        MiniscriptType::W
                    };
                    if x_type.base_type() != expected {
                        return Err(TypeError::ThresholdBase {
                            index: i,
                            found: x_type.base_type(),
                            position: node.position,
                        });
                    }
                    if !x_type.has_property(Property::U) {
                        return Err(TypeError::ThresholdNonUnit {
                            index: i,
                            position: node.position,
                        });
                    }
                    if !x_type.has_property(Property::D) {
                        return Err(TypeError::ThresholdDissat {
                            index: i,
                            position: node.position,
                        });
                    }
                }

                // properties: z=all z; o=exactly one o, the rest z; d; u
                let z_count = sub_types
                    .iter()
                    .filter(|t| t.has_property(Property::Z))
                    .count();
                let o_count = sub_types
                    .iter()
                    .filter(|t| t.has_property(Property::O))
                    .count();

                let mut properties = Vec::new();
                if z_count == sub_types.len() {
                    properties.push(Property::Z);
                }
                if o_count == 1 && z_count == sub_types.len() - 1 {
                    properties.push(Property::O);
                }
                properties.push(Property::D);
                properties.push(Property::U);

                Ok(TypeInfo::new(MiniscriptType::B, properties))
            }

            Fragment::Multi { k, keys } => {
                // Disabled under tapscript (OP_CHECKMULTISIG is gone there)
                if self.tapscript {
                    return Err(TypeError::ContextMismatch {
                        fragment: "multi",
                        position: node.position,
                    });
                }
                check_threshold("multi", *k, keys.len(), node.position)?;
                Ok(type_info!(B, "ndu"))
            }
            Fragment::MultiA { k, keys } => {
                // Tapscript only
                if !self.tapscript {
                    return Err(TypeError::ContextMismatch {
                        fragment: "multi_a",
                        position: node.position,
                    });
                }
                check_threshold("multi_a", *k, keys.len(), node.position)?;
                Ok(type_info!(B, "du"))
            }

            Fragment::Wrapped { wrapper, x } => {
                let x_type = self.visit_ast_by_index(ctx, *x)?;

                match wrapper {
                    WrapperType::A => {
                        // X is B
                        if x_type.base_type() != MiniscriptType::B {
                            return Err(TypeError::ChildBase1 {
                                wrapper: 'a',
                                found: x_type.base_type(),
                                position: node.position,
                            });
                        }
                        // properties: z, o, n, d, u all carry over
                        Ok(TypeInfo::new(
                            MiniscriptType::W,
                            x_type.properties().to_vec(),
                        ))
                    }
                    WrapperType::S => {
                        // X is Bo
                        if x_type.base_type() != MiniscriptType::B {
                            return Err(TypeError::ChildBase1 {
                                wrapper: 's',
                                found: x_type.base_type(),
                                position: node.position,
                            });
                        }
                        if !x_type.has_property(Property::O) {
                            return Err(TypeError::SwapNonOne {
                                position: node.position,
                            });
                        }

                        // properties: d=dX; u=uX
                        let mut properties = Vec::new();
                        if x_type.has_property(Property::D) {
                            properties.push(Property::D);
                        }
                        if x_type.has_property(Property::U) {
                            properties.push(Property::U);
                        }
                        Ok(TypeInfo::new(MiniscriptType::W, properties))
                    }
                    WrapperType::C => {
                        // X is K
                        if x_type.base_type() != MiniscriptType::K {
                            return Err(TypeError::ChildBase1 {
                                wrapper: 'c',
                                found: x_type.base_type(),
                                position: node.position,
                            });
                        }

                        // properties: o=oX; n=nX; d=dX; u
                        let mut properties = Vec::new();
                        if x_type.has_property(Property::O) {
                            properties.push(Property::O);
                        }
                        if x_type.has_property(Property::N) {
                            properties.push(Property::N);
                        }
                        if x_type.has_property(Property::D) {
                            properties.push(Property::D);
                        }
                        properties.push(Property::U);
                        Ok(TypeInfo::new(MiniscriptType::B, properties))
                    }
                    WrapperType::D => {
                        // X is Vz
                        if x_type.base_type() != MiniscriptType::V {
                            return Err(TypeError::ChildBase1 {
                                wrapper: 'd',
                                found: x_type.base_type(),
                                position: node.position,
                            });
                        }
                        if !x_type.has_property(Property::Z) {
                            return Err(TypeError::NonZeroDupIf {
                                position: node.position,
                            });
                        }

                        // properties: o; n; d; u under tapscript (MINIMALIF)
                        let mut properties = Vec::new();
                        properties.push(Property::O);
                        properties.push(Property::N);
                        properties.push(Property::D);
                        if self.tapscript {
                            properties.push(Property::U);
                        }
                        Ok(TypeInfo::new(MiniscriptType::B, properties))
                    }
                    WrapperType::V => {
                        // X is B
                        if x_type.base_type() != MiniscriptType::B {
                            return Err(TypeError::ChildBase1 {
                                wrapper: 'v',
                                found: x_type.base_type(),
                                position: node.position,
                            });
                        }

                        // properties: z=zX; o=oX; n=nX
                        let mut properties = Vec::new();
                        if x_type.has_property(Property::Z) {
                            properties.push(Property::Z);
                        }
                        if x_type.has_property(Property::O) {
                            properties.push(Property::O);
                        }
                        if x_type.has_property(Property::N) {
                            properties.push(Property::N);
                        }
                        Ok(TypeInfo::new(MiniscriptType::V, properties))
                    }
                    WrapperType::J => {
                        // X is Bn
                        if x_type.base_type() != MiniscriptType::B {
                            return Err(TypeError::ChildBase1 {
                                wrapper: 'j',
                                found: x_type.base_type(),
                                position: node.position,
                            });
                        }
                        if !x_type.has_property(Property::N) {
                            return Err(TypeError::NonZeroZero {
                                position: node.position,
                            });
                        }

                        // properties: o=oX; n; d; u=uX
                        let mut properties = Vec::new();
                        if x_type.has_property(Property::O) {
                            properties.push(Property::O);
                        }
                        properties.push(Property::N);
                        properties.push(Property::D);
                        if x_type.has_property(Property::U) {
                            properties.push(Property::U);
                        }
                        Ok(TypeInfo::new(MiniscriptType::B, properties))
                    }
                    WrapperType::N => {
                        // X is B
                        if x_type.base_type() != MiniscriptType::B {
                            return Err(TypeError::ChildBase1 {
                                wrapper: 'n',
                                found: x_type.base_type(),
                                position: node.position,
                            });
                        }

                        // properties: z=zX; o=oX; n=nX; d=dX; u
                        let mut properties = Vec::new();
                        if x_type.has_property(Property::Z) {
                            properties.push(Property::Z);
                        }
                        if x_type.has_property(Property::O) {
                            properties.push(Property::O);
                        }
                        if x_type.has_property(Property::N) {
                            properties.push(Property::N);
                        }
                        if x_type.has_property(Property::D) {
                            properties.push(Property::D);
                        }
                        properties.push(Property::U);
                        Ok(TypeInfo::new(MiniscriptType::B, properties))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn check(expr: &str) -> Result<TypeInfo, TypeError> {
        let ctx = parse(expr).unwrap();
        CorrectnessVisitor::new(false).visit(&ctx)
    }

    fn check_tapscript(expr: &str) -> Result<TypeInfo, TypeError> {
        let ctx = parse(expr).unwrap();
        CorrectnessVisitor::new(true).visit(&ctx)
    }

    #[test]
    fn leaf_types() {
        let t = check("pk_k(a)").unwrap();
        assert_eq!(t.base_type(), MiniscriptType::K);
        assert!(t.has_property(Property::O));
        assert!(t.has_property(Property::D));

        let t = check("older(144)").unwrap();
        assert_eq!(t.base_type(), MiniscriptType::B);
        assert!(t.has_property(Property::Z));
        assert!(!t.has_property(Property::D));
    }

    #[test]
    fn wrappers_change_base_type() {
        assert_eq!(check("pk(a)").unwrap().base_type(), MiniscriptType::B);
        assert_eq!(check("v:pk(a)").unwrap().base_type(), MiniscriptType::V);
        assert_eq!(check("a:pk(a)").unwrap().base_type(), MiniscriptType::W);
    }

    #[test]
    fn swap_requires_one_arg() {
        // pk_h consumes two elements, so s:c:pk_h is rejected
        assert!(matches!(check("s:pkh(a)"), Err(TypeError::SwapNonOne { .. })));
        assert!(check("s:pk(a)").is_ok());
    }

    #[test]
    fn dupif_requires_zero_arg() {
        assert!(matches!(
            check("d:v:pk(a)"),
            Err(TypeError::NonZeroDupIf { .. })
        ));
        assert!(check("d:v:older(1)").is_ok());
    }

    #[test]
    fn minimalif_gives_dupif_unit_only_in_tapscript() {
        let legacy = check("d:v:older(1)").unwrap();
        assert!(!legacy.has_property(Property::U));

        let tapscript = check_tapscript("d:v:older(1)").unwrap();
        assert!(tapscript.has_property(Property::U));
    }

    #[test]
    fn or_i_of_two_zero_arg_children_is_one_arg() {
        let t = check("sln:1").unwrap();
        assert_eq!(t.base_type(), MiniscriptType::W);
        assert!(t.has_property(Property::D));
        assert!(t.has_property(Property::U));
    }

    #[test]
    fn conjunction_child_bases() {
        assert!(matches!(
            check("and_v(pk(a),pk(b))"),
            Err(TypeError::ChildBase2 { fragment: "and_v", .. })
        ));
        assert!(check("and_v(v:pk(a),pk(b))").is_ok());

        assert!(matches!(
            check("and_b(pk(a),pk(b))"),
            Err(TypeError::ChildBase2 { fragment: "and_b", .. })
        ));
        assert!(check("and_b(pk(a),s:pk(b))").is_ok());
    }

    #[test]
    fn disjunction_requirements() {
        // or_c left child must be dissatisfiable and unit
        assert!(matches!(
            check("or_c(v:pk(a),v:pk(b))"),
            Err(TypeError::ChildBase2 { fragment: "or_c", .. })
        ));
        assert!(check("or_c(pk(a),v:pk(b))").is_ok());
        assert!(matches!(
            check("or_b(pk(a),a:1)"),
            Err(TypeError::RightNotDissatisfiable { .. })
        ));
    }

    #[test]
    fn threshold_rules() {
        assert!(check("thresh(2,pk(a),s:pk(b),s:pk(c))").is_ok());
        assert!(matches!(
            check("thresh(4,pk(a),s:pk(b),s:pk(c))"),
            Err(TypeError::OutOfRange { fragment: "thresh", .. })
        ));
        // every child must be dissatisfiable
        assert!(matches!(
            check("thresh(1,pk(a),a:1)"),
            Err(TypeError::ThresholdDissat { .. })
        ));
        // non-first children must be wrapped
        assert!(matches!(
            check("thresh(1,pk(a),pk(b))"),
            Err(TypeError::ThresholdBase { index: 1, .. })
        ));
    }

    #[test]
    fn multi_contexts() {
        assert!(check("multi(1,a,b)").is_ok());
        assert!(matches!(
            check_tapscript("multi(1,a,b)"),
            Err(TypeError::ContextMismatch { fragment: "multi", .. })
        ));
        assert!(check_tapscript("multi_a(1,a,b)").is_ok());
        assert!(matches!(
            check("multi_a(1,a,b)"),
            Err(TypeError::ContextMismatch { fragment: "multi_a", .. })
        ));
        assert!(matches!(
            check("multi(3,a,b)"),
            Err(TypeError::OutOfRange { fragment: "multi", .. })
        ));
    }

    #[test]
    fn locktime_values_are_range_checked() {
        assert!(matches!(
            check("after(0)"),
            Err(TypeError::OutOfRange { fragment: "after", .. })
        ));
        assert!(matches!(
            check("older(2147483648)"),
            Err(TypeError::OutOfRange { fragment: "older", .. })
        ));
        assert!(check("after(2147483647)").is_ok());
    }
}
