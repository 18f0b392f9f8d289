// Anthropic Claude provider for Rewind
//
// Implements the core Provider trait over the Messages API.

mod provider;

#[cfg(test)]
mod tests;

pub use provider::AnthropicProvider;
