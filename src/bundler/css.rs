//! CSS loader rules and postcss plugin composition

use std::path::PathBuf;

use serde::Serialize;
use serde_json::json;

use super::{Loader, Rule};
use crate::config::BuildTarget;

const BROWSER_LIST: &[&str] = &[
    "and_chr >= 57",
    "android >= 4.4",
    "chrome >= 49",
    "edge >= 12",
    "firefox >= 48",
    "ie >= 10",
    "ie_mob >= 11",
    "ios_saf >= 9",
    "opera >= 46",
    "safari >= 9.1",
    "samsung >= 4",
];

/// Comments cssnano must keep
const IMPORTANT_COMMENT: &str = r"@preserve|@license|[@#]\s*source(?:Mapping)?URL|^!";

const CSS_TEST: &str = r"\.css$";
const SASS_TEST: &str = r"\.scss$|\.sass$";

/// Loader that extracts global styles into their own file
pub const EXTRACT_LOADER: &str = "extract-text-webpack-plugin/dist/loader";

/// Inputs for the CSS rule set
#[derive(Debug, Clone)]
pub struct CssRuleOptions<'a> {
    pub target: BuildTarget,
    /// Styles declared in the app config; every other style is a component style
    pub global_style_paths: &'a [PathBuf],
    pub sourcemaps: bool,
    /// Write global styles to a stylesheet instead of injecting `<style>` tags
    pub extract: bool,
    pub deploy_url: &'a str,
    pub base_href: &'a str,
    pub include_paths: Vec<PathBuf>,
}

/// A postcss plugin the driver instantiates inside `postcss-loader`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "plugin", rename_all = "kebab-case")]
pub enum PostcssPlugin {
    /// Root-relative url() rewriting plus small asset inlining
    #[serde(rename_all = "camelCase")]
    PostcssUrl {
        deploy_url: String,
        base_href: String,
        inline_max_size_kb: u32,
    },

    Autoprefixer {
        browsers: Vec<String>,
        cascade: bool,
    },

    PostcssCustomProperties { preserve: bool },

    #[serde(rename_all = "camelCase")]
    Cssnano {
        safe: bool,
        autoprefixer: bool,
        merge_longhand: bool,
        keep_comments_matching: String,
    },
}

/// Component rules first, then global style rules
pub fn css_rules(options: &CssRuleOptions<'_>) -> Vec<Rule> {
    let source_map = options.extract && options.sourcemaps;
    let common = common_loaders(options, source_map);
    let sass = sass_loader(options, source_map);

    let with_sass = |mut loaders: Vec<Loader>| {
        loaders.push(sass.clone());
        loaders
    };

    let component = |test: &str, loaders: Vec<Loader>| Rule {
        test: test.to_string(),
        include: Vec::new(),
        exclude: options.global_style_paths.to_vec(),
        loader_chain: std::iter::once(Loader::new("exports-loader?module.exports.toString()"))
            .chain(loaders)
            .collect(),
    };

    let global = |test: &str, loaders: Vec<Loader>| Rule {
        test: test.to_string(),
        include: options.global_style_paths.to_vec(),
        exclude: Vec::new(),
        loader_chain: finalize(loaders, options.extract),
    };

    vec![
        component(CSS_TEST, common.clone()),
        component(SASS_TEST, with_sass(common.clone())),
        global(CSS_TEST, common.clone()),
        global(SASS_TEST, with_sass(common)),
    ]
}

fn common_loaders(options: &CssRuleOptions<'_>, source_map: bool) -> Vec<Loader> {
    vec![
        Loader::with_options(
            "css-loader",
            json!({ "sourceMap": source_map, "importLoaders": 1 }),
        ),
        Loader::with_options(
            "postcss-loader",
            json!({
                "ident": "postcss",
                "plugins": postcss_plugins(
                    options.target.is_production(),
                    options.deploy_url,
                    options.base_href,
                ),
                "sourceMap": source_map,
            }),
        ),
    ]
}

fn sass_loader(options: &CssRuleOptions<'_>, source_map: bool) -> Loader {
    Loader::with_options(
        "sass-loader",
        json!({
            "sourceMap": source_map,
            "precision": 8,
            "includePaths": options.include_paths,
        }),
    )
}

/// Global styles end either in `style-loader` or in the extract loader
fn finalize(loaders: Vec<Loader>, extract: bool) -> Vec<Loader> {
    let head = if extract {
        Loader::with_options(EXTRACT_LOADER, json!({ "omit": 0, "remove": true }))
    } else {
        Loader::new("style-loader")
    };

    std::iter::once(head).chain(loaders).collect()
}

pub fn postcss_plugins(minimize: bool, deploy_url: &str, base_href: &str) -> Vec<PostcssPlugin> {
    let mut plugins = vec![
        PostcssPlugin::PostcssUrl {
            deploy_url: deploy_url.to_string(),
            base_href: base_href.to_string(),
            inline_max_size_kb: 10,
        },
        PostcssPlugin::Autoprefixer {
            browsers: BROWSER_LIST.iter().map(|b| b.to_string()).collect(),
            cascade: false,
        },
        PostcssPlugin::PostcssCustomProperties { preserve: true },
    ];

    if minimize {
        plugins.push(PostcssPlugin::Cssnano {
            safe: true,
            autoprefixer: false,
            merge_longhand: false,
            keep_comments_matching: IMPORTANT_COMMENT.to_string(),
        });
    }

    plugins
}
