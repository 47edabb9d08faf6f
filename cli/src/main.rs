//! `rdfkit`: a thin command-line demonstrator over [`rdfkit_store::Store`].
//!
//! This is intentionally minimal -- it exists to exercise the library end to
//! end (load, query, update, materialize, stats), not to be a production
//! SPARQL endpoint. It has no HTTP server and no Turtle/N-Triples/RDF-XML/
//! JSON-LD parser: `load` accepts a small line-oriented subset of N-Triples
//! (IRIs, blank nodes, and plain/lang/typed literals, one triple per line)
//! good enough for demos and fixtures.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use rdfkit_model::{DecodedTriple, Term};
use rdfkit_store::{LoaderControl, LoaderOptions, LoaderProgress, Store, StoreOptions};

#[derive(Parser)]
#[command(name = "rdfkit", about = "Persistent RDF store with SPARQL 1.1 and OWL 2 RL / RDFS reasoning")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bulk-load triples from a line-oriented N-Triples subset file.
    Load {
        #[arg(long)]
        db: PathBuf,
        input: PathBuf,
    },
    /// Run a SPARQL SELECT/ASK/CONSTRUCT/DESCRIBE query and print the solutions as JSON.
    Query {
        #[arg(long)]
        db: PathBuf,
        sparql: String,
    },
    /// Run a SPARQL Update operation (INSERT DATA / DELETE DATA / DELETE WHERE / ...).
    Update {
        #[arg(long)]
        db: PathBuf,
        sparql: String,
    },
    /// Run the RDFS / OWL 2 RL fixpoint to completion and persist the derived facts.
    Materialize {
        #[arg(long)]
        db: PathBuf,
    },
    /// Print the store's collected statistics.
    Stats {
        #[arg(long)]
        db: PathBuf,
    },
    /// Write every explicit triple back out in the same line-oriented N-Triples subset
    /// `load` accepts, so the two round-trip through this demonstrator's toy format.
    Export {
        #[arg(long)]
        db: PathBuf,
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Load { db, input } => run_load(&db, &input),
        Command::Query { db, sparql } => run_query(&db, &sparql),
        Command::Update { db, sparql } => run_update(&db, &sparql),
        Command::Materialize { db } => run_materialize(&db),
        Command::Stats { db } => run_stats(&db),
        Command::Export { db, output } => run_export(&db, &output),
    }
}

fn open(db: &PathBuf) -> Result<Store> {
    Store::open(db, StoreOptions::default()).with_context(|| format!("opening store at {}", db.display()))
}

fn run_load(db: &PathBuf, input: &PathBuf) -> Result<()> {
    let store = open(db)?;
    let file = File::open(input).with_context(|| format!("reading {}", input.display()))?;
    let triples: Vec<DecodedTriple> = BufReader::new(file)
        .lines()
        .enumerate()
        .filter_map(|(lineno, line)| {
            let line = line.ok()?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            Some(parse_triple_line(trimmed).with_context(move || format!("line {}: {trimmed}", lineno + 1)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut on_progress = |progress: LoaderProgress| -> LoaderControl {
        tracing::info!(triples_loaded = progress.triples_loaded, batch_number = progress.batch_number, "load progress");
        LoaderControl::Continue
    };
    let outcome = store.load(triples, &LoaderOptions::default(), Some(&mut on_progress))?;
    match outcome {
        rdfkit_store::LoadOutcome::Completed { loaded_count } => {
            println!("loaded {loaded_count} triples");
        }
        rdfkit_store::LoadOutcome::Halted { halted_count } => {
            println!("load halted after {halted_count} triples");
        }
    }
    Ok(())
}

fn run_query(db: &PathBuf, sparql: &str) -> Result<()> {
    let store = open(db)?;
    let solutions = store.prepare_and_execute(sparql)?;
    print_solutions(&solutions)
}

fn run_update(db: &PathBuf, sparql: &str) -> Result<()> {
    let store = open(db)?;
    let report = store.update(sparql)?;
    println!("inserted {} deleted {}", report.inserted, report.deleted);
    Ok(())
}

fn run_materialize(db: &PathBuf) -> Result<()> {
    let store = open(db)?;
    let report = store.materialize()?;
    println!(
        "derived {} facts in {} iterations (partial: {:?})",
        report.derived_count, report.iterations, report.partial
    );
    Ok(())
}

fn run_stats(db: &PathBuf) -> Result<()> {
    let store = open(db)?;
    let stats = store.statistics();
    let summary = serde_json::json!({
        "total_triples": stats.total_triples,
        "distinct_subjects": stats.distinct_subjects,
        "distinct_predicates": stats.distinct_predicates,
        "distinct_objects": stats.distinct_objects,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_export(db: &PathBuf, output: &PathBuf) -> Result<()> {
    use std::io::Write;

    let store = open(db)?;
    let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let mut writer = std::io::BufWriter::new(file);
    let count = store.export(|triple| {
        writeln!(
            writer,
            "{} {} {} .",
            format_subject_or_predicate(&triple.subject),
            format_subject_or_predicate(&triple.predicate),
            format_object(&triple.object)
        )
        .map_err(|e| rdfkit_store::StoreError::Fatal(format!("writing {}: {e}", output.display())))?;
        Ok(())
    })?;
    println!("exported {count} triples");
    Ok(())
}

fn format_subject_or_predicate(term: &Term) -> String {
    match term {
        Term::NamedNode(iri) => format!("<{iri}>"),
        Term::BlankNode(id) => format!("_:{id}"),
        other => format!("<{}>", other.lexical_form()),
    }
}

fn format_object(term: &Term) -> String {
    match term {
        Term::NamedNode(iri) => format!("<{iri}>"),
        Term::BlankNode(id) => format!("_:{id}"),
        Term::SimpleLiteral(value) => format!("\"{value}\""),
        Term::LangLiteral { value, language } => format!("\"{value}\"@{language}"),
        Term::TypedLiteral { value, datatype } => format!("\"{value}\"^^<{datatype}>"),
        Term::Numeric(n) => format!("\"{}\"^^<{}>", n.lexical_form(), n.datatype()),
    }
}

fn print_solutions(solutions: &rdfkit_eval::QuerySolutions) -> Result<()> {
    use rdfkit_algebra::Variable;
    use rdfkit_eval::QuerySolutions;

    let value = match solutions {
        QuerySolutions::Select { variables, rows } => {
            let rows: Vec<_> = rows
                .iter()
                .map(|row| {
                    let mut obj = serde_json::Map::new();
                    for var in variables {
                        if let Some(term) = row.get(var) {
                            obj.insert(var.as_str().to_string(), serde_json::Value::String(term.lexical_form()));
                        }
                    }
                    serde_json::Value::Object(obj)
                })
                .collect();
            serde_json::json!({ "head": { "vars": variables.iter().map(Variable::as_str).collect::<Vec<_>>() }, "results": rows })
        }
        QuerySolutions::Ask(found) => serde_json::json!({ "boolean": found }),
        QuerySolutions::Construct(triples) | QuerySolutions::Describe(triples) => {
            let triples: Vec<_> = triples
                .iter()
                .map(|t| serde_json::json!({ "subject": t.subject.lexical_form(), "predicate": t.predicate.lexical_form(), "object": t.object.lexical_form() }))
                .collect();
            serde_json::json!({ "triples": triples })
        }
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Parses one line of the form `<s> <p> <o> .` where each slot is an IRI in angle
/// brackets, a blank node (`_:id`), or (object only) a literal: `"value"`,
/// `"value"@lang`, or `"value"^^<datatype-iri>`.
fn parse_triple_line(line: &str) -> Result<DecodedTriple> {
    let body = line.strip_suffix('.').map(str::trim_end).unwrap_or(line);
    let mut rest = body.trim_start();

    let (subject, r) = take_subject_or_predicate(rest)?;
    rest = r.trim_start();
    let (predicate, r) = take_subject_or_predicate(rest)?;
    rest = r.trim_start();
    let object = take_object(rest.trim())?;

    Ok(DecodedTriple { subject, predicate, object })
}

fn take_subject_or_predicate(s: &str) -> Result<(Term, &str)> {
    if let Some(r) = s.strip_prefix('<') {
        let end = r.find('>').context("unterminated IRI: missing '>'")?;
        let iri = &r[..end];
        return Ok((Term::named_node(iri), &r[end + 1..]));
    }
    if let Some(r) = s.strip_prefix("_:") {
        let end = r.find(char::is_whitespace).unwrap_or(r.len());
        return Ok((Term::blank_node(&r[..end]), &r[end..]));
    }
    bail!("expected '<iri>' or '_:blank', found: {s}");
}

fn take_object(s: &str) -> Result<Term> {
    if let Some(r) = s.strip_prefix('<') {
        let end = r.find('>').context("unterminated IRI: missing '>'")?;
        return Ok(Term::named_node(&r[..end]));
    }
    if let Some(r) = s.strip_prefix("_:") {
        return Ok(Term::blank_node(r));
    }
    if let Some(r) = s.strip_prefix('"') {
        let end = r.find('"').context("unterminated literal: missing closing '\"'")?;
        let value = r[..end].to_string();
        let tail = &r[end + 1..];
        if let Some(lang) = tail.strip_prefix('@') {
            return Ok(Term::LangLiteral { value, language: lang.trim().to_string() });
        }
        if let Some(dt) = tail.strip_prefix("^^<") {
            let dt_end = dt.find('>').context("unterminated datatype IRI: missing '>'")?;
            return Ok(Term::TypedLiteral { value, datatype: dt[..dt_end].to_string() });
        }
        return Ok(Term::SimpleLiteral(value));
    }
    bail!("expected '<iri>', '_:blank' or a quoted literal, found: {s}");
}
