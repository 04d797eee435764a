/// リクエスト側の systemPrompt を優先し、空なら既定値を使う
pub fn resolve_system_prompt<'a>(requested: Option<&'a str>, fallback: &'a str) -> &'a str {
    match requested {
        Some(prompt) if !prompt.trim().is_empty() => prompt,
        _ => fallback,
    }
}
