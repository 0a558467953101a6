//! Query template rendering.
//!
//! Placeholders are replaced by literal find-and-replace, in this order:
//!
//! 1. custom filters, in request order: `$key` and `$KEY` (empty keys are
//!    ignored)
//! 2. `$PROJECT`, `$STAGE`, `$SERVICE`, `$DEPLOYMENT`
//! 3. labels: `$LABEL.<key>`
//! 4. `$DURATION_SECONDS`, rendered as e.g. `300s`

use sli_core::{EvaluationContext, TimeWindow};

use crate::resolver::EffectiveConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("no custom query specified for indicator '{0}'")]
    NoQuery(String),
}

/// Template configured for `indicator`. A missing or empty entry is an
/// error; there is no fallback query.
pub fn query_for<'a>(config: &'a EffectiveConfig, indicator: &str) -> Result<&'a str, TemplateError> {
    config
        .get(indicator)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| TemplateError::NoQuery(indicator.to_string()))
}

/// Look up and render the query for `indicator`.
pub fn render_indicator(
    config: &EffectiveConfig,
    indicator: &str,
    ctx: &EvaluationContext,
    window: &TimeWindow,
) -> Result<String, TemplateError> {
    query_for(config, indicator).map(|template| render(template, ctx, window))
}

/// Render `template` against the evaluation context and window.
pub fn render(template: &str, ctx: &EvaluationContext, window: &TimeWindow) -> String {
    let mut query = template.to_string();

    for filter in ctx.custom_filters.iter().filter(|f| !f.key.is_empty()) {
        let value = sanitize(&filter.value);
        query = query.replace(&format!("${}", filter.key), &value);
        query = query.replace(&format!("${}", filter.key.to_uppercase()), &value);
    }

    query = query
        .replace("$PROJECT", &ctx.project)
        .replace("$STAGE", &ctx.stage)
        .replace("$SERVICE", &ctx.service)
        .replace("$DEPLOYMENT", &ctx.deployment);

    // Longest key first so `$LABEL.app` never clobbers `$LABEL.app_version`.
    let mut labels: Vec<_> = ctx.labels.iter().collect();
    labels.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    for (key, value) in labels {
        query = query.replace(&format!("$LABEL.{key}"), value);
    }

    query.replace("$DURATION_SECONDS", &format!("{}s", window.duration_seconds))
}

fn sanitize(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '\'' | '"')).collect()
}
