use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use kerf_errors::{Diagnostic, Renderer};
use kerf_parse::{ParserOptions, TagBinder, rewrite, tag_helper_prefix};
use kerf_syntax::SyntaxTree;
use kerf_tokenizer::{CodeTokenizer, MarkupTokenizer, SeekableSource, Token, tokenize};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(clap::Args)]
struct Input {
    path: Utf8PathBuf,
    /// Keep whitespace around code in markup, as an editor would.
    #[arg(long)]
    design_time: bool,
    /// Name reported in diagnostics instead of the path.
    #[arg(long)]
    file_name: Option<String>,
}

impl Input {
    fn read(&self) -> anyhow::Result<(Arc<str>, String)> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read `{}`", self.path))?;
        let name = self.file_name.clone().unwrap_or_else(|| self.path.to_string());
        Ok((Arc::from(name), text))
    }

    fn parse(&self) -> anyhow::Result<(Arc<str>, String, SyntaxTree)> {
        let (name, text) = self.read()?;
        let options = ParserOptions::default().design_time(self.design_time);
        let source = SeekableSource::new(text.as_str()).with_file(Some(Arc::clone(&name)));
        let Some(tree) = kerf_parse::parse_source(source, options, None) else {
            anyhow::bail!("parse of `{name}` was cancelled");
        };

        // No host descriptors here; the rewrite still checks tag structure.
        let binder = TagBinder::default().with_prefix(tag_helper_prefix(&tree));
        let tree = rewrite(&tree, &binder, Some(&name));
        debug!(nodes = tree.len(), "parsed `{name}`");
        Ok((name, text, tree))
    }
}

#[derive(Parser)]
#[command(version, about = "Inspect how template documents parse")]
enum Options {
    /// Print the syntax tree and its diagnostics.
    Parse(Input),
    /// Print the tokens of a document.
    Tokens {
        #[command(flatten)]
        input: Input,
        /// Tokenize as code instead of markup.
        #[arg(long)]
        code: bool,
    },
    /// Report diagnostics; fails when there are any.
    Check(Input),
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("KERF_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    println!("Errors:");
    for diagnostic in diagnostics {
        println!("  {diagnostic}");
    }
}

fn main() -> anyhow::Result<ExitCode> {
    init_logging();

    match Options::parse() {
        Options::Parse(input) => {
            let (_, _, tree) = input.parse()?;
            println!("{}", tree.debug_dump());
            print_diagnostics(&tree.diagnostics());
            Ok(ExitCode::SUCCESS)
        }
        Options::Tokens { input, code } => {
            let (name, text) = input.read()?;
            let source = SeekableSource::new(text.as_str()).with_file(Some(name));
            let tokens: Vec<Token> = if code {
                tokenize::<CodeTokenizer>(source)
            } else {
                tokenize::<MarkupTokenizer>(source)
            };
            for token in &tokens {
                println!("{token}");
            }
            let diagnostics: Vec<Diagnostic> =
                tokens.iter().flat_map(|token| token.diagnostics.iter().cloned()).collect();
            print_diagnostics(&diagnostics);
            Ok(ExitCode::SUCCESS)
        }
        Options::Check(input) => {
            let (name, text, tree) = input.parse()?;
            let diagnostics = tree.diagnostics();
            let renderer = Renderer::styled();
            for diagnostic in &diagnostics {
                eprintln!("{}", diagnostic.render(&renderer, &name, &text));
            }
            if diagnostics.is_empty() { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::FAILURE) }
        }
    }
}
