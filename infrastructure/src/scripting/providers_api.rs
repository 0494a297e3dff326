//! `harbor.llm` / `harbor.web` Lua API — provider capabilities for scripts.
//!
//! Both entry points are synchronous from the script's perspective:
//!
//! ```lua
//! local snippet = harbor.web.search("Rust borrow checker")
//! local reply = harbor.llm.chat("Summarize: " .. snippet)
//! ```
//!
//! `chat` sends a single ad-hoc user turn through the gateway — it shares
//! the provider resource pool but never touches an orchestrator transcript.
//! Both calls are safe from inside a tool handler (re-entrancy): the
//! blocking bridge parks on a runtime without taking any registry or
//! transcript lock.

use mlua::prelude::*;
use std::future::Future;
use std::sync::Arc;

use harbor_application::ports::llm_gateway::{GatewayError, LlmGateway};
use harbor_application::ports::web_search::WebSearchPort;
use harbor_domain::Turn;

/// Register the `harbor.llm` and `harbor.web` tables on the `harbor` global.
pub fn register_providers_api(
    lua: &Lua,
    harbor_table: &LuaTable,
    gateway: Arc<dyn LlmGateway>,
    search: Arc<dyn WebSearchPort>,
) -> LuaResult<()> {
    let llm = lua.create_table()?;
    {
        let gateway = Arc::clone(&gateway);
        let chat_fn = lua.create_function(move |_, prompt: String| {
            if prompt.is_empty() {
                return Err(LuaError::external("prompt cannot be empty"));
            }
            let gateway = Arc::clone(&gateway);
            let text = block_on_provider(async move {
                let turns = [Turn::user(prompt)];
                gateway.complete(None, &turns).await
            })
            .map_err(|e| LuaError::external(format!("llm chat failed: {}", e)))?;
            Ok(text)
        })?;
        llm.set("chat", chat_fn)?;
    }
    harbor_table.set("llm", llm)?;

    let web = lua.create_table()?;
    {
        let search = Arc::clone(&search);
        let search_fn = lua.create_function(move |_, query: String| {
            if query.is_empty() {
                return Err(LuaError::external("query cannot be empty"));
            }
            let search = Arc::clone(&search);
            let text = block_on_provider(async move { search.search(&query).await })
                .map_err(|e| LuaError::external(format!("web search failed: {}", e)))?;
            Ok(text)
        })?;
        web.set("search", search_fn)?;
    }
    harbor_table.set("web", web)?;

    Ok(())
}

/// Bridge a provider future into the synchronous script world.
///
/// Inside a tokio runtime worker the call parks via `block_in_place` (the
/// host runtime is multi-threaded); outside any runtime — the usual case,
/// since scripts run on a plain blocking thread — a throwaway
/// current-thread runtime drives the future.
fn block_on_provider<T, F>(fut: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => tokio::task::block_in_place(|| handle.block_on(fut)),
        Err(_) => match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(fut),
            Err(e) => Err(GatewayError::Network(format!(
                "failed to create blocking runtime: {}",
                e
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoGateway;

    #[async_trait]
    impl LlmGateway for EchoGateway {
        async fn complete(
            &self,
            _system_prompt: Option<&str>,
            turns: &[Turn],
        ) -> Result<String, GatewayError> {
            let prompt = turns.last().map(|t| t.content.as_str()).unwrap_or("");
            Ok(format!("echo: {}", prompt))
        }
    }

    struct StubSearch;

    #[async_trait]
    impl WebSearchPort for StubSearch {
        async fn search(&self, query: &str) -> Result<String, GatewayError> {
            Ok(format!("results for '{}'", query))
        }
    }

    struct FailingGateway;

    #[async_trait]
    impl LlmGateway for FailingGateway {
        async fn complete(
            &self,
            _system_prompt: Option<&str>,
            _turns: &[Turn],
        ) -> Result<String, GatewayError> {
            Err(GatewayError::AuthFailed("no key".into()))
        }
    }

    fn make_lua(gateway: Arc<dyn LlmGateway>, search: Arc<dyn WebSearchPort>) -> Lua {
        let lua = Lua::new();
        let harbor = lua.create_table().unwrap();
        register_providers_api(&lua, &harbor, gateway, search).unwrap();
        lua.globals().set("harbor", harbor).unwrap();
        lua
    }

    #[test]
    fn test_llm_chat_from_script() {
        let lua = make_lua(Arc::new(EchoGateway), Arc::new(StubSearch));

        lua.load(r#"reply = harbor.llm.chat("hello")"#).exec().unwrap();
        let reply: String = lua.globals().get("reply").unwrap();
        assert_eq!(reply, "echo: hello");
    }

    #[test]
    fn test_web_search_from_script() {
        let lua = make_lua(Arc::new(EchoGateway), Arc::new(StubSearch));

        lua.load(r#"snippet = harbor.web.search("rust")"#).exec().unwrap();
        let snippet: String = lua.globals().get("snippet").unwrap();
        assert_eq!(snippet, "results for 'rust'");
    }

    #[test]
    fn test_chat_composes_with_search() {
        let lua = make_lua(Arc::new(EchoGateway), Arc::new(StubSearch));

        lua.load(
            r#"
            local snippet = harbor.web.search("rust")
            reply = harbor.llm.chat("Summarize: " .. snippet)
        "#,
        )
        .exec()
        .unwrap();

        let reply: String = lua.globals().get("reply").unwrap();
        assert_eq!(reply, "echo: Summarize: results for 'rust'");
    }

    #[test]
    fn test_gateway_failure_surfaces_as_lua_error() {
        let lua = make_lua(Arc::new(FailingGateway), Arc::new(StubSearch));

        let result = lua.load(r#"harbor.llm.chat("hello")"#).exec();
        let err = result.unwrap_err().to_string();
        assert!(err.contains("llm chat failed"));
        assert!(err.contains("Authentication failed"));
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let lua = make_lua(Arc::new(EchoGateway), Arc::new(StubSearch));
        assert!(lua.load(r#"harbor.llm.chat("")"#).exec().is_err());
        assert!(lua.load(r#"harbor.web.search("")"#).exec().is_err());
    }
}
