//! A shared contract and its services: a root `App` that chains to a
//! calculator and a shape store, with a declared exception, a polymorphic
//! message hierarchy and a generic `Page<T>` message.

use async_trait::async_trait;
use chainrpc_client::{args, ClientError, ClientProxy};
use chainrpc_core::{
    EnumDescriptor, InterfaceDescriptor, Message, MessageDescriptor, MethodDescriptor, Service,
    ServiceError, ServiceFactory, Step, TypeError, TypeId, TypeRef, TypeRegistry, Value,
};
use std::sync::Arc;

/// The linked registry plus the ids the services and tests need.
#[derive(Debug, Clone)]
pub struct Contract {
    pub registry: Arc<TypeRegistry>,
    pub app: TypeId,
    pub app_exception: TypeId,
    pub other_error: TypeId,
    pub base: TypeId,
    pub a: TypeId,
    pub b: TypeId,
    pub page_of_strings: TypeId,
}

pub fn contract() -> Result<Contract, TypeError> {
    let registry = TypeRegistry::new();

    registry.register_enum(EnumDescriptor::new("Number", ["ONE", "TWO", "THREE"]))?;
    registry.register_enum(EnumDescriptor::new("Kind", ["base", "a", "b"]))?;

    registry.register_message(
        MessageDescriptor::builder("AppException")
            .field("message", TypeRef::STRING)
            .build(),
    )?;
    registry.register_message(
        MessageDescriptor::builder("OtherError")
            .field("message", TypeRef::STRING)
            .build(),
    )?;
    registry.register_message(
        MessageDescriptor::builder("Base")
            .discriminator("type", TypeRef::named("Kind"))
            .discriminator_value("base")
            .field("field", TypeRef::STRING)
            .subtype(TypeRef::named("A"))
            .subtype(TypeRef::named("B"))
            .build(),
    )?;
    registry.register_message(
        MessageDescriptor::builder("A")
            .base(TypeRef::named("Base"))
            .discriminator_value("a")
            .field("a_field", TypeRef::INT32)
            .build(),
    )?;
    registry.register_message(
        MessageDescriptor::builder("B")
            .base(TypeRef::named("Base"))
            .discriminator_value("b")
            .field("b_field", TypeRef::list(TypeRef::named("Number")))
            .build(),
    )?;
    registry.register_message(
        MessageDescriptor::builder("Page")
            .type_param("T")
            .field("items", TypeRef::list(TypeRef::var("T")))
            .field("next", TypeRef::INT32)
            .build(),
    )?;

    registry.register_interface(
        InterfaceDescriptor::builder("App")
            .exc(TypeRef::named("AppException"))
            .method("calc", &[], TypeRef::named("Calc"))
            .method("shapes", &[], TypeRef::named("Shapes"))
            .method(
                "page",
                &[("offset", TypeRef::INT32), ("limit", TypeRef::INT32)],
                TypeRef::generic("Page", vec![TypeRef::STRING]),
            )
            .build(),
    )?;
    registry.register_interface(
        InterfaceDescriptor::builder("Calc")
            .method("sum", &[("i0", TypeRef::INT32), ("i1", TypeRef::INT32)], TypeRef::INT32)
            .method("divide", &[("a", TypeRef::DOUBLE), ("b", TypeRef::DOUBLE)], TypeRef::DOUBLE)
            .method("scaled", &[("factor", TypeRef::INT32)], TypeRef::named("Calc"))
            .method("classify", &[("n", TypeRef::INT32)], TypeRef::named("Number"))
            .method("fail", &[("how", TypeRef::STRING)], TypeRef::VOID)
            .build(),
    )?;
    registry.register_interface(
        InterfaceDescriptor::builder("Shapes")
            .method("echo", &[("shape", TypeRef::named("Base"))], TypeRef::named("Base"))
            .method("describe", &[("shape", TypeRef::named("Base"))], TypeRef::STRING)
            .method("all", &[], TypeRef::list(TypeRef::named("Base")))
            .build(),
    )?;

    registry.link()?;

    Ok(Contract {
        app: registry.resolve("App")?,
        app_exception: registry.resolve("AppException")?,
        other_error: registry.resolve("OtherError")?,
        base: registry.resolve("Base")?,
        a: registry.resolve("A")?,
        b: registry.resolve("B")?,
        page_of_strings: registry.resolve_ref(&TypeRef::generic("Page", vec![TypeRef::STRING]))?,
        registry: Arc::new(registry),
    })
}

/// Root service factory: a fresh [`AppService`] per request.
pub fn factory(contract: &Contract) -> Arc<dyn ServiceFactory> {
    let contract = Arc::new(contract.clone());
    let factory = move || -> Arc<dyn Service> {
        Arc::new(AppService {
            contract: Arc::clone(&contract),
        })
    };
    Arc::new(factory)
}

pub struct AppService {
    contract: Arc<Contract>,
}

#[async_trait]
impl Service for AppService {
    async fn invoke(&self, method: &MethodDescriptor, args: Vec<Value>) -> Result<Step, ServiceError> {
        match method.name() {
            "calc" => Ok(Step::chain(CalcService {
                contract: Arc::clone(&self.contract),
                factor: 1,
            })),
            "shapes" => Ok(Step::chain(ShapesService {
                contract: Arc::clone(&self.contract),
            })),
            "page" => {
                let offset = args[0].as_i64().unwrap_or_default();
                let limit = args[1].as_i64().unwrap_or_default();
                let items: Vec<String> = (offset..offset + limit).map(|i| format!("item-{}", i)).collect();
                let page = Message::new(self.contract.page_of_strings)
                    .with("items", items)
                    .with("next", (offset + limit) as i32);
                Ok(Step::value(page))
            }
            other => Err(anyhow::anyhow!("App has no method {}", other).into()),
        }
    }
}

pub struct CalcService {
    contract: Arc<Contract>,
    factor: i64,
}

impl CalcService {
    fn app_exception(&self, message: &str) -> ServiceError {
        ServiceError::raise(Message::new(self.contract.app_exception).with("message", message))
    }
}

#[async_trait]
impl Service for CalcService {
    async fn invoke(&self, method: &MethodDescriptor, args: Vec<Value>) -> Result<Step, ServiceError> {
        match method.name() {
            "sum" => {
                let i0 = args[0].as_i64().unwrap_or_default();
                let i1 = args[1].as_i64().unwrap_or_default();
                let sum = (i0 + i1) * self.factor;
                i32::try_from(sum)
                    .map(Step::value)
                    .map_err(|_| self.app_exception("sum overflowed"))
            }
            "divide" => {
                let a = args[0].as_f64().unwrap_or_default();
                let b = args[1].as_f64().unwrap_or_default();
                if b == 0.0 {
                    return Err(self.app_exception("division by zero"));
                }
                Ok(Step::value(a / b * self.factor as f64))
            }
            "scaled" => Ok(Step::chain(CalcService {
                contract: Arc::clone(&self.contract),
                factor: self.factor * args[0].as_i64().unwrap_or(1),
            })),
            "classify" => {
                let name = match args[0].as_i64().unwrap_or_default() {
                    1 => "ONE",
                    2 => "TWO",
                    3 => "THREE",
                    _ => return Ok(Step::Return(Value::Null)),
                };
                Ok(Step::value(Value::enumeration(name)))
            }
            "fail" => match args[0].as_str().unwrap_or_default() {
                "declared" => Err(self.app_exception("failed on purpose")),
                "undeclared" => Err(ServiceError::raise(
                    Message::new(self.contract.other_error).with("message", "not part of the contract"),
                )),
                "nothing" => Ok(Step::value(())),
                _ => Err(anyhow::anyhow!("calculator crashed").into()),
            },
            other => Err(anyhow::anyhow!("Calc has no method {}", other).into()),
        }
    }
}

pub struct ShapesService {
    contract: Arc<Contract>,
}

#[async_trait]
impl Service for ShapesService {
    async fn invoke(&self, method: &MethodDescriptor, args: Vec<Value>) -> Result<Step, ServiceError> {
        let contract = &self.contract;
        match method.name() {
            "echo" => Ok(Step::Return(args.into_iter().next().unwrap_or_default())),
            "describe" => {
                let shape = args.into_iter().next().and_then(Value::into_message);
                let description = match shape {
                    Some(shape) if shape.type_id() == contract.a => {
                        format!("a:{}", shape.get("a_field").and_then(Value::as_i64).unwrap_or_default())
                    }
                    Some(shape) if shape.type_id() == contract.b => {
                        let count = shape.get("b_field").and_then(Value::as_list).map_or(0, |l| l.len());
                        format!("b:{}", count)
                    }
                    Some(_) => "base".to_string(),
                    None => "none".to_string(),
                };
                Ok(Step::value(description))
            }
            "all" => Ok(Step::value(vec![
                Message::new(contract.base).with("field", "plain"),
                Message::new(contract.a).with("field", "first").with("a_field", 1i32),
                Message::new(contract.b)
                    .with("field", "second")
                    .with("b_field", Value::List(vec![Value::enumeration("TWO")])),
            ])),
            other => Err(anyhow::anyhow!("Shapes has no method {}", other).into()),
        }
    }
}

/// Typed client stub for `App`.
#[derive(Debug, Clone, PartialEq)]
pub struct AppStub {
    proxy: ClientProxy,
}

impl AppStub {
    pub fn new(proxy: ClientProxy) -> Self {
        AppStub { proxy }
    }

    pub fn proxy(&self) -> &ClientProxy {
        &self.proxy
    }

    pub fn calc(&self) -> Result<CalcStub, ClientError> {
        Ok(CalcStub {
            proxy: self.proxy.chain("calc", args![])?,
        })
    }

    pub fn shapes(&self) -> Result<ShapesStub, ClientError> {
        Ok(ShapesStub {
            proxy: self.proxy.chain("shapes", args![])?,
        })
    }

    pub async fn page(&self, offset: i32, limit: i32) -> Result<Message, ClientError> {
        self.proxy.invoke_as("page", args![offset, limit]).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalcStub {
    proxy: ClientProxy,
}

impl CalcStub {
    pub fn proxy(&self) -> &ClientProxy {
        &self.proxy
    }

    pub fn scaled(&self, factor: i32) -> Result<CalcStub, ClientError> {
        Ok(CalcStub {
            proxy: self.proxy.chain("scaled", args![factor])?,
        })
    }

    pub async fn sum(&self, i0: i32, i1: i32) -> Result<i32, ClientError> {
        self.proxy.invoke_as("sum", args![i0, i1]).await
    }

    pub async fn divide(&self, a: f64, b: f64) -> Result<f64, ClientError> {
        self.proxy.invoke_as("divide", args![a, b]).await
    }

    pub async fn classify(&self, n: i32) -> Result<Option<String>, ClientError> {
        match self.proxy.invoke("classify", args![n]).await? {
            Value::Enum(name) => Ok(Some(name)),
            _ => Ok(None),
        }
    }

    pub async fn fail(&self, how: &str) -> Result<(), ClientError> {
        self.proxy.invoke_as("fail", args![how]).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapesStub {
    proxy: ClientProxy,
}

impl ShapesStub {
    pub async fn echo(&self, shape: Message) -> Result<Message, ClientError> {
        self.proxy.invoke_as("echo", args![shape]).await
    }

    pub async fn describe(&self, shape: Message) -> Result<String, ClientError> {
        self.proxy.invoke_as("describe", args![shape]).await
    }

    pub async fn all(&self) -> Result<Vec<Message>, ClientError> {
        self.proxy.invoke_as("all", args![]).await
    }
}
