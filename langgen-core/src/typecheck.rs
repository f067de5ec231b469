//! Construction pass: abstract expressions to resolved, typed IR.
//!
//! Construction runs for one property at a time through an explicit
//! `Constructor` context. The context carries the environment binding state:
//! whether the ambient environment may be referenced, and under which name
//! the generated code sees it.
//!
//! - `bind`, `bind_name` and `bind_default` return a `BindingScope` guard.
//!   The guard dereferences to the constructor, and dropping it restores the
//!   binding state saved on entry, including when construction fails with
//!   `?` inside the scope.
//! - Every property body is constructed inside exactly one `bind_default`
//!   scope (see `construct_property`).

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::ast::{AbstractExpr, Literal, MAX_NESTING_DEPTH};
use crate::error::{CoreError, check};
use crate::hir::{LiteralValue, LocalVars, PropertyIr, ResolvedExpr, ResolvedKind};
use crate::types::{SubtypeResult, Type, TypeRegistry};

/// Name of the implicit environment parameter in generated code.
pub const DEFAULT_ENV_NAME: &str = "Current_Env";

/// Generated-code name of the empty environment.
pub const EMPTY_ENV_NAME: &str = "AST_Envs.Empty_Env";

/// Diagnostic for a reference to `Env` with no environment available.
pub const UNBOUND_ENV_MESSAGE: &str = "This property has no implicit environment parameter: \
     please use the eval_in_env construct to bind an environment first.";

/// A property to construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    /// Node type the property is declared on.
    pub owner: String,
    pub name: String,
    /// Whether the property receives the ambient environment as a parameter.
    pub has_implicit_env: bool,
    /// Declared result type, if any.
    pub ty: Option<Type>,
    pub body: AbstractExpr,
}

impl PropertyDef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, body: AbstractExpr) -> Self {
        PropertyDef {
            owner: owner.into(),
            name: name.into(),
            has_implicit_env: false,
            ty: None,
            body,
        }
    }

    pub fn with_implicit_env(mut self) -> Self {
        self.has_implicit_env = true;
        self
    }

    pub fn with_type(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }
}

/// The property whose body is being constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentProperty {
    pub owner: String,
    pub name: String,
    pub has_implicit_env: bool,
}

/// Environment binding state saved and restored by binding scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingState {
    pub property: Option<CurrentProperty>,
    /// Whether an environment was explicitly bound.
    pub is_bound: bool,
    /// Name the ambient environment renders as.
    pub env_name: String,
}

impl Default for BindingState {
    fn default() -> Self {
        BindingState {
            property: None,
            is_bound: false,
            env_name: DEFAULT_ENV_NAME.to_string(),
        }
    }
}

impl BindingState {
    pub fn has_ambient_env(&self) -> bool {
        self.property.as_ref().is_some_and(|p| p.has_implicit_env) || self.is_bound
    }
}

/// Context of the construction pass.
#[derive(Debug)]
pub struct Constructor<'reg> {
    registry: &'reg TypeRegistry,
    binding: BindingState,
    vars: LocalVars,
    array_types: Vec<Type>,
    depth: usize,
}

/// Guard returned by the binding operations of `Constructor`.
pub struct BindingScope<'c, 'reg> {
    ctx: &'c mut Constructor<'reg>,
    saved: BindingState,
}

impl<'reg> Deref for BindingScope<'_, 'reg> {
    type Target = Constructor<'reg>;

    fn deref(&self) -> &Constructor<'reg> {
        self.ctx
    }
}

impl<'reg> DerefMut for BindingScope<'_, 'reg> {
    fn deref_mut(&mut self) -> &mut Constructor<'reg> {
        self.ctx
    }
}

impl Drop for BindingScope<'_, '_> {
    fn drop(&mut self) {
        std::mem::swap(&mut self.ctx.binding, &mut self.saved);
    }
}

impl fmt::Debug for BindingScope<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingScope")
            .field("current", &self.ctx.binding)
            .field("saved", &self.saved)
            .finish()
    }
}

impl<'reg> Constructor<'reg> {
    pub fn new(registry: &'reg TypeRegistry) -> Self {
        Constructor {
            registry,
            binding: BindingState::default(),
            vars: LocalVars::default(),
            array_types: Vec::new(),
            depth: 0,
        }
    }

    pub fn binding_state(&self) -> &BindingState {
        &self.binding
    }

    pub fn vars(&self) -> &LocalVars {
        &self.vars
    }

    pub fn array_types(&self) -> &[Type] {
        &self.array_types
    }

    fn enter(&mut self, update: impl FnOnce(&mut BindingState)) -> BindingScope<'_, 'reg> {
        let saved = self.binding.clone();
        update(&mut self.binding);
        BindingScope { ctx: self, saved }
    }

    /// Mark the ambient environment as bound for the extent of the scope.
    pub fn bind(&mut self) -> BindingScope<'_, 'reg> {
        self.enter(|state| state.is_bound = true)
    }

    /// Bind the ambient environment to the variable `name`.
    pub fn bind_name(&mut self, name: impl Into<String>) -> BindingScope<'_, 'reg> {
        let name = name.into();
        self.enter(|state| {
            state.is_bound = true;
            state.env_name = name;
        })
    }

    /// Set up the default binding for `prop`: its implicit parameter if it
    /// declares one, no binding otherwise.
    pub fn bind_default(&mut self, prop: &PropertyDef) -> BindingScope<'_, 'reg> {
        let current = CurrentProperty {
            owner: prop.owner.clone(),
            name: prop.name.clone(),
            has_implicit_env: prop.has_implicit_env,
        };
        self.enter(|state| {
            if current.has_implicit_env {
                state.is_bound = true;
                state.env_name = DEFAULT_ENV_NAME.to_string();
            } else {
                state.is_bound = false;
            }
            state.property = Some(current);
        })
    }

    fn record_array_type(&mut self, ty: &Type) {
        if !self.array_types.contains(ty) {
            self.array_types.push(ty.clone());
        }
    }

    /// Construct `expr`, checking that its type is compatible with
    /// `expected` when one is given.
    pub fn construct(
        &mut self,
        expr: &AbstractExpr,
        expected: Option<&Type>,
    ) -> Result<ResolvedExpr, CoreError> {
        check(self.depth < MAX_NESTING_DEPTH, || {
            CoreError::type_error(
                format!("expression nested more than {MAX_NESTING_DEPTH} levels deep"),
                "E0209",
            )
        })?;
        self.depth += 1;
        let resolved = self.construct_expr(expr, expected);
        self.depth -= 1;
        let resolved = resolved?;
        if let Some(expected) = expected {
            let compatible = self.registry.is_subtype(&resolved.ty, expected);
            check(compatible != SubtypeResult::NotSubtype, || {
                CoreError::type_error(
                    format!(
                        "expected type {expected}, got {} for expression `{expr}`",
                        resolved.ty
                    ),
                    "E0201",
                )
            })?;
        }
        Ok(resolved)
    }

    fn construct_expr(
        &mut self,
        expr: &AbstractExpr,
        expected: Option<&Type>,
    ) -> Result<ResolvedExpr, CoreError> {
        match expr {
            AbstractExpr::Literal(lit) => Ok(construct_literal(lit)),
            AbstractExpr::SelfNode => self.construct_self(),
            AbstractExpr::Env => {
                check(self.binding.has_ambient_env(), || {
                    CoreError::type_error(UNBOUND_ENV_MESSAGE, "E0202")
                })?;
                Ok(ResolvedExpr::variable(
                    self.binding.env_name.clone(),
                    Type::LexicalEnv,
                ))
            }
            AbstractExpr::EmptyEnv => Ok(ResolvedExpr::variable(EMPTY_ENV_NAME, Type::LexicalEnv)),
            AbstractExpr::Field { receiver, field } => self.construct_field(receiver, field),
            AbstractExpr::Array(elements) => {
                self.construct_array(elements, expected.and_then(Type::element_type))
            }
            AbstractExpr::EnvGet {
                env,
                key,
                recursive,
                sequential,
                resolve_unique,
            } => self.construct_env_get(env, key, recursive, *sequential, *resolve_unique),
            AbstractExpr::EvalInEnv { env, expr } => self.construct_eval_in_env(env, expr),
            AbstractExpr::Orphan(env) => {
                let env = self.construct(env, Some(&Type::LexicalEnv))?;
                Ok(self.builtin_call("AST_Envs.Orphan", vec![env], Type::LexicalEnv, Some("Orphan_Env")))
            }
            AbstractExpr::Group(array) => {
                let array = self.construct(array, Some(&Type::array_of(Type::LexicalEnv)))?;
                Ok(self.builtin_call("Group", vec![array], Type::LexicalEnv, Some("Group_Env")))
            }
            AbstractExpr::GroupAll(envs) => {
                let array = self.construct_array(envs, Some(&Type::LexicalEnv))?;
                Ok(self.builtin_call("Group", vec![array], Type::LexicalEnv, Some("Group_Env")))
            }
            AbstractExpr::IsVisibleFrom { referenced, base } => {
                let base = self.construct(base, Some(&Type::LexicalEnv))?;
                let referenced = self.construct(referenced, Some(&Type::LexicalEnv))?;
                Ok(self.builtin_call("Is_Visible_From", vec![base, referenced], Type::Bool, None))
            }
            AbstractExpr::EnvNode(env) => {
                let env = self.construct(env, Some(&Type::LexicalEnv))?;
                let root = self.registry.root_node()?;
                Ok(ResolvedExpr::new(ResolvedKind::EnvNode(Box::new(env)), root))
            }
        }
    }

    fn construct_self(&mut self) -> Result<ResolvedExpr, CoreError> {
        let owner = self
            .binding
            .property
            .as_ref()
            .map(|p| p.owner.clone())
            .ok_or_else(|| {
                CoreError::type_error("Self is only available inside a property", "E0206")
            })?;
        Ok(ResolvedExpr::variable("Self", Type::Node(owner)))
    }

    fn construct_field(
        &mut self,
        receiver: &AbstractExpr,
        field: &str,
    ) -> Result<ResolvedExpr, CoreError> {
        let receiver = self.construct(receiver, None)?;
        let Type::Node(node) = &receiver.ty else {
            return Err(CoreError::type_error(
                format!("cannot access field {field} on a value of type {}", receiver.ty),
                "E0203",
            ));
        };
        let ty = self.registry.field_type(node, field).cloned().ok_or_else(|| {
            CoreError::type_error(format!("node type {node} has no field {field}"), "E0204")
        })?;
        Ok(ResolvedExpr::new(
            ResolvedKind::FieldAccess {
                receiver: Box::new(receiver),
                field: field.to_string(),
            },
            ty,
        ))
    }

    /// Array literals take their element type from the context when there is
    /// one, and from the elements otherwise.
    fn construct_array(
        &mut self,
        elements: &[AbstractExpr],
        element_type: Option<&Type>,
    ) -> Result<ResolvedExpr, CoreError> {
        let mut resolved = Vec::with_capacity(elements.len());
        for element in elements {
            resolved.push(self.construct(element, element_type)?);
        }
        let element_type = match element_type {
            Some(ty) => ty.clone(),
            None => self.infer_element_type(&resolved)?,
        };
        let ty = Type::array_of(element_type.clone());
        self.record_array_type(&ty);
        Ok(ResolvedExpr::new(
            ResolvedKind::Array {
                elements: resolved,
                element_type,
            },
            ty,
        ))
    }

    fn infer_element_type(&self, elements: &[ResolvedExpr]) -> Result<Type, CoreError> {
        let (first, rest) = elements.split_first().ok_or_else(|| {
            CoreError::type_error("cannot infer the element type of an empty array", "E0205")
        })?;
        rest.iter().try_fold(first.ty.clone(), |acc, e| {
            self.registry.least_common_supertype(&acc, &e.ty).ok_or_else(|| {
                CoreError::type_error(
                    format!("array elements have incompatible types {acc} and {}", e.ty),
                    "E0205",
                )
            })
        })
    }

    fn construct_env_get(
        &mut self,
        env: &AbstractExpr,
        key: &AbstractExpr,
        recursive: &AbstractExpr,
        sequential: bool,
        resolve_unique: bool,
    ) -> Result<ResolvedExpr, CoreError> {
        check(!matches!(key, AbstractExpr::Array(elements) if elements.is_empty()), || {
            CoreError::type_error(
                "wrong type for lookup key: expected Symbol or Token, got an empty array",
                "E0207",
            )
        })?;
        let mut key = self.construct(key, None)?;
        if key.ty == Type::Token {
            key = ResolvedExpr::new(ResolvedKind::GetSymbol(Box::new(key)), Type::Symbol);
        }
        check(key.ty == Type::Symbol, || {
            CoreError::type_error(
                format!("wrong type for lookup key: expected Symbol or Token, got {}", key.ty),
                "E0207",
            )
        })?;

        let env = self.construct(env, Some(&Type::LexicalEnv))?;
        let from = if sequential {
            let root = self.registry.root_node()?;
            Some(Box::new(self.construct(&AbstractExpr::SelfNode, Some(&root))?))
        } else {
            None
        };
        let recursive = self.construct(recursive, Some(&Type::Bool))?;

        let ty = if resolve_unique {
            Type::EnvElement
        } else {
            let ty = Type::array_of(Type::EnvElement);
            self.record_array_type(&ty);
            ty
        };
        let var = self.vars.create("Env_Get_Result", ty.clone());
        let kind = ResolvedKind::EnvGet {
            env: Box::new(env),
            key: Box::new(key),
            from,
            recursive: Box::new(recursive),
            resolve_unique,
        };
        Ok(ResolvedExpr::new(kind, ty).with_result_var(var))
    }

    fn construct_eval_in_env(
        &mut self,
        env: &AbstractExpr,
        expr: &AbstractExpr,
    ) -> Result<ResolvedExpr, CoreError> {
        // The environment operand sees the outer binding.
        let env = self.construct(env, Some(&Type::LexicalEnv))?;
        let env_var = self.vars.create("New_Env", Type::LexicalEnv);
        let body = {
            let mut scope = self.bind_name(env_var.name.clone());
            scope.construct(expr, None)?
        };
        let ty = body.ty.clone();
        let kind = ResolvedKind::EnvBind {
            env: Box::new(env),
            env_var,
            expr: Box::new(body),
        };
        Ok(ResolvedExpr::new(kind, ty))
    }

    fn builtin_call(
        &mut self,
        name: &str,
        args: Vec<ResolvedExpr>,
        ty: Type,
        result_var: Option<&str>,
    ) -> ResolvedExpr {
        let expr = ResolvedExpr::new(
            ResolvedKind::BuiltinCall {
                name: name.to_string(),
                args,
            },
            ty.clone(),
        );
        match result_var {
            Some(prefix) => {
                let var = self.vars.create(prefix, ty);
                expr.with_result_var(var)
            }
            None => expr,
        }
    }
}

fn construct_literal(lit: &Literal) -> ResolvedExpr {
    match lit {
        Literal::Bool(b) => ResolvedExpr::new(ResolvedKind::Literal(LiteralValue::Bool(*b)), Type::Bool),
        Literal::Int(i) => ResolvedExpr::new(ResolvedKind::Literal(LiteralValue::Int(*i)), Type::Int),
        Literal::Text(text) => ResolvedExpr::new(
            ResolvedKind::Literal(LiteralValue::Symbol(text.clone())),
            Type::Symbol,
        ),
    }
}

/// Construct one property body inside its default binding scope.
pub fn construct_property(
    registry: &TypeRegistry,
    prop: &PropertyDef,
) -> Result<PropertyIr, CoreError> {
    let context = format!("property {}", prop.qualified_name());
    check(registry.node(&prop.owner).is_some(), || {
        CoreError::type_error(format!("unknown owner node type {}", prop.owner), "E0208")
            .in_context(context.clone())
    })?;
    if let Some(ty) = &prop.ty {
        registry
            .check_declared(ty)
            .map_err(|e| e.in_context(context.clone()))?;
    }

    let mut ctx = Constructor::new(registry);
    let body = {
        let mut scope = ctx.bind_default(prop);
        scope.construct(&prop.body, prop.ty.as_ref())
    }
    .map_err(|e| e.in_context(context))?;

    Ok(PropertyIr {
        owner: prop.owner.clone(),
        name: prop.name.clone(),
        has_implicit_env: prop.has_implicit_env,
        body,
        vars: ctx.vars.into_vec(),
        array_types: ctx.array_types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeType;

    fn registry() -> TypeRegistry {
        TypeRegistry::new(vec![
            NodeType {
                name: "FooNode".into(),
                base: None,
                fields: vec![],
            },
            NodeType {
                name: "Name".into(),
                base: Some("FooNode".into()),
                fields: vec![("tok".into(), Type::Token)],
            },
            NodeType {
                name: "Example".into(),
                base: Some("FooNode".into()),
                fields: vec![
                    ("name".into(), Type::Node("Name".into())),
                    ("count".into(), Type::Int),
                ],
            },
        ])
        .expect("registry")
    }

    fn with_env(body: AbstractExpr) -> PropertyDef {
        PropertyDef::new("Example", "prop", body).with_implicit_env()
    }

    #[test]
    fn lookup_with_text_key_yields_array_of_elements() {
        let reg = registry();
        let prop = construct_property(&reg, &with_env(AbstractExpr::env().get("foo")))
            .expect("construct");
        assert_eq!(prop.body.ty, Type::array_of(Type::EnvElement));
        assert_eq!(prop.array_types, vec![Type::array_of(Type::EnvElement)]);
        let ResolvedKind::EnvGet { key, from, .. } = &prop.body.kind else {
            panic!("expected a lookup");
        };
        assert_eq!(key.ty, Type::Symbol);
        assert!(from.is_none());
        assert_eq!(prop.vars[0].name, "Env_Get_Result_0");
    }

    #[test]
    fn resolve_unique_yields_single_element() {
        let reg = registry();
        let prop = construct_property(&reg, &with_env(AbstractExpr::env().resolve_unique("foo")))
            .expect("construct");
        assert_eq!(prop.body.ty, Type::EnvElement);
        assert!(prop.array_types.is_empty());
    }

    #[test]
    fn token_keys_are_interned_and_sequential_lookups_thread_self() {
        let reg = registry();
        let body = AbstractExpr::env()
            .get_sequential(AbstractExpr::self_node().field("name").field("tok"));
        let prop = construct_property(&reg, &with_env(body)).expect("construct");
        let ResolvedKind::EnvGet { key, from, .. } = &prop.body.kind else {
            panic!("expected a lookup");
        };
        assert!(matches!(key.kind, ResolvedKind::GetSymbol(_)));
        let from = from.as_ref().expect("sequential lookup has a From operand");
        assert_eq!(from.ty, Type::Node("Example".into()));
    }

    #[test]
    fn rejects_lookup_keys_of_other_types() {
        let reg = registry();
        let err = construct_property(&reg, &with_env(AbstractExpr::env().get(AbstractExpr::from(3))))
            .unwrap_err();
        let diag = err.diagnostic().expect("diagnostic");
        assert_eq!(diag.code, Some("E0207"));
        assert!(diag.message.contains("got Int"));
        assert_eq!(diag.context.as_deref(), Some("property Example.prop"));
    }

    #[test]
    fn empty_array_key_reports_wrong_key_type() {
        let reg = registry();
        let err = construct_property(&reg, &with_env(AbstractExpr::env().get(AbstractExpr::array([]))))
            .unwrap_err();
        let diag = err.diagnostic().expect("diagnostic");
        assert_eq!(diag.code, Some("E0207"));
        assert!(diag.message.contains("got an empty array"));

        let err = construct_property(
            &reg,
            &with_env(AbstractExpr::env().get(AbstractExpr::array([AbstractExpr::env()]))),
        )
        .unwrap_err();
        let diag = err.diagnostic().expect("diagnostic");
        assert_eq!(diag.code, Some("E0207"));
        assert!(diag.message.contains("got [LexicalEnv]"));
    }

    #[test]
    fn deeply_nested_bodies_are_reported() {
        let reg = registry();
        let nested = |depth: usize| (0..depth).fold(AbstractExpr::env(), |e, _| e.orphan());

        let prop = construct_property(&reg, &with_env(nested(100))).expect("construct");
        assert_eq!(prop.body.ty, Type::LexicalEnv);

        let err = construct_property(&reg, &with_env(nested(MAX_NESTING_DEPTH + 10))).unwrap_err();
        let diag = err.diagnostic().expect("diagnostic");
        assert_eq!(diag.code, Some("E0209"));
    }

    #[test]
    fn unbound_env_is_rejected() {
        let reg = registry();
        let prop = PropertyDef::new("Example", "prop", AbstractExpr::env().orphan());
        let err = construct_property(&reg, &prop).unwrap_err();
        assert!(matches!(&err, CoreError::TypeError(diag) if diag.message == UNBOUND_ENV_MESSAGE));
    }

    #[test]
    fn eval_in_env_shadows_the_ambient_environment() {
        let reg = registry();
        // No implicit env: the outer operand may only use EmptyEnv, the body
        // sees the bound variable.
        let body = AbstractExpr::empty_env()
            .orphan()
            .eval_in_env(AbstractExpr::env().eval_in_env(AbstractExpr::env().resolve_unique("x")));
        let prop = construct_property(&reg, &PropertyDef::new("Example", "prop", body))
            .expect("construct");

        let ResolvedKind::EnvBind { env_var: outer, expr, .. } = &prop.body.kind else {
            panic!("expected a bind");
        };
        let ResolvedKind::EnvBind { env, env_var: inner, expr } = &expr.kind else {
            panic!("expected a nested bind");
        };
        assert!(matches!(&env.kind, ResolvedKind::Variable { name } if *name == outer.name));
        let ResolvedKind::EnvGet { env, .. } = &expr.kind else {
            panic!("expected a lookup");
        };
        assert!(matches!(&env.kind, ResolvedKind::Variable { name } if *name == inner.name));
        assert_eq!(outer.name, "New_Env_0");
        assert_eq!(inner.name, "New_Env_1");
        assert_eq!(prop.body.ty, Type::EnvElement);
    }

    #[test]
    fn eval_in_env_restores_binding_after_construction() {
        let reg = registry();
        let prop = with_env(AbstractExpr::env());
        let mut ctx = Constructor::new(&reg);
        let mut scope = ctx.bind_default(&prop);
        let before = scope.binding_state().clone();
        let expr = AbstractExpr::env().orphan().eval_in_env(AbstractExpr::env());
        let resolved = scope.construct(&expr, None).expect("construct");
        assert_eq!(scope.binding_state(), &before);
        assert_eq!(before.env_name, DEFAULT_ENV_NAME);
        let ResolvedKind::EnvBind { env, expr, .. } = &resolved.kind else {
            panic!("expected a bind");
        };
        let ResolvedKind::BuiltinCall { args, .. } = &env.kind else {
            panic!("expected orphan");
        };
        assert!(matches!(&args[0].kind, ResolvedKind::Variable { name } if name == DEFAULT_ENV_NAME));
        assert!(matches!(&expr.kind, ResolvedKind::Variable { name } if name == "New_Env_0"));
    }

    #[test]
    fn binding_scopes_restore_state_on_error() {
        let reg = registry();
        let mut ctx = Constructor::new(&reg);
        let initial = ctx.binding_state().clone();
        {
            let mut outer = ctx.bind_name("Outer_Env");
            let before = outer.binding_state().clone();
            let prop = PropertyDef::new("Example", "prop", AbstractExpr::env());
            let result = {
                let mut scope = outer.bind_default(&prop);
                assert!(!scope.binding_state().has_ambient_env());
                scope.construct(&prop.body, None)
            };
            assert!(result.is_err());
            assert_eq!(outer.binding_state(), &before);
            assert!(outer.binding_state().has_ambient_env());

            let failing = AbstractExpr::empty_env().eval_in_env(AbstractExpr::env().get(false));
            assert!(outer.construct(&failing, None).is_err());
            assert_eq!(outer.binding_state(), &before);
        }
        assert_eq!(ctx.binding_state(), &initial);
    }

    #[test]
    fn bind_marks_env_available() {
        let reg = registry();
        let mut ctx = Constructor::new(&reg);
        assert!(!ctx.binding_state().has_ambient_env());
        {
            let scope = ctx.bind();
            assert!(scope.binding_state().has_ambient_env());
            assert_eq!(scope.binding_state().env_name, DEFAULT_ENV_NAME);
        }
        assert!(!ctx.binding_state().has_ambient_env());
    }

    #[test]
    fn groups_accept_empty_arrays() {
        let reg = registry();
        let prop = construct_property(
            &reg,
            &PropertyDef::new("Example", "prop", AbstractExpr::group_all([])),
        )
        .expect("construct");
        assert_eq!(prop.body.ty, Type::LexicalEnv);
        assert_eq!(prop.vars[0].name, "Group_Env_0");

        let prop = construct_property(
            &reg,
            &PropertyDef::new("Example", "prop", AbstractExpr::array([]).env_group()),
        )
        .expect("construct");
        let ResolvedKind::BuiltinCall { args, .. } = &prop.body.kind else {
            panic!("expected group");
        };
        assert_eq!(args[0].ty, Type::array_of(Type::LexicalEnv));
    }

    #[test]
    fn derived_environment_operations_check_operands() {
        let reg = registry();
        let body = AbstractExpr::env().is_visible_from(AbstractExpr::empty_env());
        let prop = construct_property(&reg, &with_env(body)).expect("construct");
        assert_eq!(prop.body.ty, Type::Bool);
        let ResolvedKind::BuiltinCall { name, args } = &prop.body.kind else {
            panic!("expected builtin call");
        };
        assert_eq!(name, "Is_Visible_From");
        assert!(matches!(&args[0].kind, ResolvedKind::Variable { name } if name == EMPTY_ENV_NAME));

        let prop = construct_property(&reg, &with_env(AbstractExpr::env().env_node()))
            .expect("construct");
        assert_eq!(prop.body.ty, Type::Node("FooNode".into()));

        let err = construct_property(&reg, &with_env(AbstractExpr::from(true).orphan())).unwrap_err();
        let diag = err.diagnostic().expect("diagnostic");
        assert_eq!(diag.code, Some("E0201"));
        assert!(diag.message.contains("expected type LexicalEnv, got Bool"));
    }

    #[test]
    fn checks_declared_property_type() {
        let reg = registry();
        let prop = with_env(AbstractExpr::env().get("foo")).with_type(Type::EnvElement);
        let err = construct_property(&reg, &prop).unwrap_err();
        assert!(matches!(err, CoreError::TypeError(diag) if diag.code == Some("E0201")));

        let prop = PropertyDef::new("Example", "prop", AbstractExpr::self_node().field("count"))
            .with_type(Type::Int);
        assert!(construct_property(&reg, &prop).is_ok());

        let prop = PropertyDef::new("Example", "prop", AbstractExpr::self_node().field("missing"));
        let err = construct_property(&reg, &prop).unwrap_err();
        assert!(matches!(err, CoreError::TypeError(diag) if diag.code == Some("E0204")));
    }
}
