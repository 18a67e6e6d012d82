use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use interpose_core::binding::{applies_to, Applicability, IgnoreRule, MethodIdentity};
use interpose_core::keys::CallArguments;
use interpose_core::BehaviorError;

use super::Binding;
use crate::behavior::{AsyncNext, BehaviorHandle, Context, Next, Value};

/// A target object wrapped in its ordered behavior bindings.
///
/// `E` is the error type of the wrapped capability. Failures from the real
/// call pass through every behavior unchanged and reach the caller as-is;
/// failures raised by behaviors reach it through `From<BehaviorError>`.
pub struct Pipeline<T, E> {
    target: Arc<T>,
    target_type: &'static str,
    /// Outermost first.
    bindings: Vec<Binding<E>>,
    ignores: HashMap<&'static str, Vec<IgnoreRule>>,
}

impl<T, E> Pipeline<T, E> {
    pub(crate) fn new(
        target: Arc<T>,
        target_type: &'static str,
        bindings: Vec<Binding<E>>,
        ignores: HashMap<&'static str, Vec<IgnoreRule>>,
    ) -> Self {
        Self {
            target,
            target_type,
            bindings,
            ignores,
        }
    }

    pub fn target(&self) -> &Arc<T> {
        &self.target
    }

    pub fn target_type(&self) -> &'static str {
        self.target_type
    }

    /// Bindings in application order, outermost first.
    pub fn bindings(&self) -> &[Binding<E>] {
        &self.bindings
    }
}

impl<T, E> Pipeline<T, E>
where
    T: Send + Sync + 'static,
    E: From<BehaviorError> + Display + Send + 'static,
{
    /// Runs a synchronous method through the bindings that apply to it.
    ///
    /// `call` performs the real call on the target. Its result must be
    /// `Clone` since caching behaviors hand out shared copies.
    pub fn call<R, F>(&self, method: MethodIdentity, args: CallArguments, call: F) -> Result<R, E>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(&T) -> Result<R, E>,
    {
        let chain = self.chain(method);
        if chain.is_empty() {
            return call(self.target.as_ref()).inspect_err(|err| self.report(method, err));
        }

        let target: &T = self.target.as_ref();
        let real: Next<'_, E> =
            Box::new(move || call(target).map(|result| Arc::new(result) as Value));
        let result = self.dispatch(&chain, method, &args, real);
        self.finish(method, result)
    }

    /// Runs an asynchronous method through the bindings that apply to it.
    ///
    /// `call` starts the real call on the target. Capability traits declared
    /// with `#[async_trait]` already return a [`BoxFuture`], so the method
    /// itself can usually be passed through: `|svc| svc.fetch(id)`.
    pub async fn call_async<'a, R, F>(
        &'a self,
        method: MethodIdentity,
        args: CallArguments,
        call: F,
    ) -> Result<R, E>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(&'a T) -> BoxFuture<'a, Result<R, E>> + Send + 'a,
    {
        let chain = self.chain(method);
        if chain.is_empty() {
            return call(self.target.as_ref())
                .await
                .inspect_err(|err| self.report(method, err));
        }

        let target: &'a T = self.target.as_ref();
        let real: AsyncNext<'_, E> = Box::new(move || {
            call(target)
                .map(|result| result.map(|value| Arc::new(value) as Value))
                .boxed()
        });
        let result = self.dispatch_async(&chain, method, &args, real).await;
        self.finish(method, result)
    }

    /// The bindings that intercept `method`, outermost first.
    fn chain(&self, method: MethodIdentity) -> Vec<&Binding<E>> {
        let rules = self
            .ignores
            .get(method.name())
            .map(Vec::as_slice)
            .unwrap_or_default();

        self.bindings
            .iter()
            .filter(|binding| match applies_to(&binding.descriptor, method.name(), rules) {
                Applicability::Applies => true,
                Applicability::Ignored => {
                    tracing::trace!(
                        target_type = self.target_type,
                        method = %method,
                        behavior = binding.descriptor.behavior.name(),
                        "Binding ignored"
                    );
                    false
                }
                Applicability::OtherMethod => false,
            })
            .collect()
    }

    fn context<'a>(
        &'a self,
        binding: &'a Binding<E>,
        method: MethodIdentity,
        args: &'a CallArguments,
    ) -> Context<'a> {
        Context {
            target: self.target.as_ref() as &(dyn Any + Send + Sync),
            target_type: self.target_type,
            method,
            args,
            config: &binding.config,
        }
    }

    fn dispatch<'a>(
        &'a self,
        chain: &'a [&'a Binding<E>],
        method: MethodIdentity,
        args: &'a CallArguments,
        real: Next<'a, E>,
    ) -> Result<Value, E> {
        let Some((binding, inner)) = chain.split_first() else {
            return real();
        };

        match &binding.handle {
            BehaviorHandle::Dual { sync, .. } => {
                let ctx = self.context(binding, method, args);
                sync.invoke(&ctx, Box::new(move || self.dispatch(inner, method, args, real)))
            }
            BehaviorHandle::AsyncOnly(_) => Err(BehaviorError::UnsupportedOperationKind {
                behavior: binding.descriptor.behavior.name(),
                method: method.name(),
            }
            .into()),
        }
    }

    fn dispatch_async<'a>(
        &'a self,
        chain: &'a [&'a Binding<E>],
        method: MethodIdentity,
        args: &'a CallArguments,
        real: AsyncNext<'a, E>,
    ) -> BoxFuture<'a, Result<Value, E>> {
        let Some((binding, inner)) = chain.split_first() else {
            return real();
        };

        let behavior = match &binding.handle {
            BehaviorHandle::Dual { asynchronous, .. } => asynchronous,
            BehaviorHandle::AsyncOnly(behavior) => behavior,
        };

        async move {
            let ctx = self.context(binding, method, args);
            behavior
                .invoke_async(
                    &ctx,
                    Box::new(move || self.dispatch_async(inner, method, args, real)),
                )
                .await
        }
        .boxed()
    }

    fn finish<R>(&self, method: MethodIdentity, result: Result<Value, E>) -> Result<R, E>
    where
        R: Clone + 'static,
    {
        let value = result.inspect_err(|err| self.report(method, err))?;
        value.downcast_ref::<R>().cloned().ok_or_else(|| {
            let err = BehaviorError::ResultTypeMismatch {
                method: method.name(),
            };
            tracing::error!(target_type = self.target_type, method = %method, "{err}");
            err.into()
        })
    }

    fn report(&self, method: MethodIdentity, err: &E) {
        tracing::debug!(
            target_type = self.target_type,
            method = %method,
            error = %err,
            "Intercepted call failed"
        );
    }
}
