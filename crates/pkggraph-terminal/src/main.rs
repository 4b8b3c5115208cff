use pkggraph::build_order::{BuildOrder, OrderBy};
use pkggraph::graph::{DepsGraph, Node};
use pkggraph::model::{Profile, RequireDecl};
use pkggraph::provider::LocalRecipeIndex;
use pkggraph::{BinaryAnalyzer, BuildPolicy, GraphBuilder, GraphConfig, Lockfile};

const USAGE: &str = "Usage:
    pkggraph-terminal graph info <index.json> --requires=REF... [options]
    pkggraph-terminal graph build-order <index.json> --requires=REF... [--build=POLICY] [--order-by=recipe|configuration] [--reduce]
    pkggraph-terminal graph build-order-merge --file=FILE... [--reduce]";

fn main() {
	env_logger::init();

	let mut opts;

	/* Parse console input */
	let parsed_options = {
		let args: Vec<String> = std::env::args().collect();

		opts = getopts::Options::new();
		opts.optflag( "h", "help",             "Show help");
		opts.optmulti("",  "requires",         "Requirement of the virtual root", "REF");
		opts.optmulti("",  "tool-requires",    "Tool requirement of the virtual root", "REF");
		opts.optmulti("s", "settings",         "Host setting", "NAME=VALUE");
		opts.optmulti("o", "options",          "Host option", "[PATTERN:]NAME=VALUE");
		opts.optopt(  "",  "profile-host",     "Host profile file", "FILE");
		opts.optopt(  "",  "profile-build",    "Build profile file", "FILE");
		opts.optmulti("b", "build",            "Build policy: never, missing, missing:PATTERN, PATTERN, ~PATTERN", "POLICY");
		opts.optopt(  "",  "lockfile",         "Lockfile pinning requirements", "FILE");
		opts.optflag( "",  "lockfile-partial", "Let requirements missing from the lockfile resolve");
		opts.optopt(  "",  "lockfile-out",     "Write the lockfile of the resulting graph", "FILE");
		opts.optopt(  "f", "format",           "Output format: json, dot or text", "FORMAT");
		opts.optopt(  "",  "order-by",         "Build order granularity: recipe or configuration", "ORDER");
		opts.optflag( "",  "reduce",           "Only keep what has to be built");
		opts.optmulti("",  "file",             "Build order file to merge", "FILE");
		opts.parsing_style(getopts::ParsingStyle::FloatingFrees);

		let parsed_options = match opts.parse(&args[1..]) {
			Ok(m)  => { m }
			Err(e) => { eprintln!("Unable to parse options: {}", e); std::process::exit(2) }
		};

		if parsed_options.opt_present("h") {
			eprintln!("{}", opts.usage(USAGE));
			return;
		}

		parsed_options
	};

	let config = match std::env::var("PKGGRAPH_CONFIG") {
		Ok(path) => GraphConfig::load_from_disk(&path).unwrap_or_else(|e| {
			log::warn!("Failed to read config file {}: {}", path, e);
			log::warn!("Using default config.");
			GraphConfig::default()
		}),
		Err(_) => GraphConfig::default(),
	};

	let command: Vec<&str> = parsed_options.free.iter().map(|s| s.as_str()).collect();
	let result = match command.as_slice() {
		["graph", "info", index] => graph_info(&config, &parsed_options, index),
		["graph", "build-order", index] => graph_build_order(&config, &parsed_options, index),
		["graph", "build-order-merge"] => graph_build_order_merge(&parsed_options),
		_ => {
			eprintln!("{}", opts.usage(USAGE));
			Err(Error::MissingArgument)
		},
	};

	if let Err(e) = result {
		log::error!("{}", e);
		std::process::exit(1);
	}
}

fn profiles(options: &getopts::Matches) -> Result<(Profile, Profile), Error> {
	let mut host = match options.opt_str("profile-host") {
		Some(path) => Profile::load_from_disk(path)?,
		None => Profile::default(),
	};
	let build = match options.opt_str("profile-build") {
		Some(path) => Profile::load_from_disk(path)?,
		None => Profile::default(),
	};
	for setting in options.opt_strs("s") {
		let (name, value) = setting.split_once('=').ok_or_else(|| Error::InvalidArgument(setting.clone()))?;
		host.set_setting(name.trim(), value.trim());
	}
	for option in options.opt_strs("o") {
		host.add_option(&option)?;
	}
	Ok((host, build))
}

fn lockfile(options: &getopts::Matches) -> Result<Option<Lockfile>, Error> {
	let Some(path) = options.opt_str("lockfile") else {
		return Ok(None);
	};
	let mut lockfile = Lockfile::load_from_disk(path)?;
	lockfile.set_partial(options.opt_present("lockfile-partial"));
	Ok(Some(lockfile))
}

/// Loads the graph of the command line requirements, binaries are only analyzed when it resolved.
fn load_graph(config: &GraphConfig, options: &getopts::Matches, index: &LocalRecipeIndex) -> Result<DepsGraph, Error> {
	let requires: Vec<RequireDecl> = options.opt_strs("requires").iter().map(|r| RequireDecl::new(r)).collect();
	let tool_requires: Vec<RequireDecl> = options.opt_strs("tool-requires").iter().map(|r| RequireDecl::new(r)).collect();
	if requires.is_empty() && tool_requires.is_empty() {
		return Err(Error::MissingArgument);
	}
	let (host, build) = profiles(options)?;
	let lockfile = lockfile(options)?;

	let root = Node::virtual_root(requires, tool_requires);
	let mut graph = GraphBuilder::new(index)
		.config(config.clone())
		.load_graph(root, &host, &build, lockfile.as_ref())?;

	if graph.error.is_none() {
		let policy = BuildPolicy::parse(options.opt_strs("build").iter().map(|s| s.as_str()))?;
		BinaryAnalyzer::new(index)
			.config(config.clone())
			.evaluate_graph(&mut graph, &policy)?;

		if let Some(path) = options.opt_str("lockfile-out") {
			let mut out = lockfile.unwrap_or_default();
			out.update_from_graph(&graph);
			out.save_to_disk(&path)?;
			log::info!("Saved lockfile to {}", path);
		}
	}
	Ok(graph)
}

fn graph_info(config: &GraphConfig, options: &getopts::Matches, index_path: &str) -> Result<(), Error> {
	let index = LocalRecipeIndex::load_from_disk(index_path)?;
	let graph = load_graph(config, options, &index)?;

	match options.opt_str("format").as_deref() {
		None | Some("text") => {
			for n in graph.ordered_iterate() {
				let node = graph.node(n);
				match (node.package_id(), node.binary) {
					(Some(package_id), Some(binary)) => println!("{}:{} - {}", node.label(), package_id, binary),
					_ => println!("{}", node.label()),
				}
			}
		},
		Some("json") => println!("{}", serde_json::to_string_pretty(&graph.serialize())?),
		Some("dot") => println!("{}", graph.to_dot()),
		Some(other) => return Err(Error::InvalidArgument(format!("unknown format '{}'", other))),
	}

	graph.report_graph_error().map_err(pkggraph::Error::from)?;
	Ok(())
}

fn order_by(options: &getopts::Matches) -> Result<OrderBy, Error> {
	match options.opt_str("order-by").as_deref() {
		None | Some("recipe") => Ok(OrderBy::Recipe),
		Some("configuration") => Ok(OrderBy::Configuration),
		Some(other) => Err(Error::InvalidArgument(format!("unknown build order '{}'", other))),
	}
}

fn print_order(order: &BuildOrder, options: &getopts::Matches) -> Result<(), Error> {
	match options.opt_str("format").as_deref() {
		None | Some("json") => println!("{}", serde_json::to_string_pretty(&order.serialize()?)?),
		Some("text") => {
			for line in order.summary().map_err(pkggraph::Error::from)? {
				println!("{}", line);
			}
		},
		Some(other) => return Err(Error::InvalidArgument(format!("unknown format '{}'", other))),
	}
	Ok(())
}

fn graph_build_order(config: &GraphConfig, options: &getopts::Matches, index_path: &str) -> Result<(), Error> {
	let index = LocalRecipeIndex::load_from_disk(index_path)?;
	let graph = load_graph(config, options, &index)?;
	if let Err(e) = graph.report_graph_error() {
		println!("{}", serde_json::to_string_pretty(&graph.serialize())?);
		return Err(pkggraph::Error::from(e).into());
	}

	let mut order = BuildOrder::from_graph(&graph, order_by(options)?).map_err(pkggraph::Error::from)?;
	if options.opt_present("reduce") {
		order.reduce();
	}
	print_order(&order, options)?;
	order.raise_errors().map_err(pkggraph::Error::from)?;
	Ok(())
}

fn graph_build_order_merge(options: &getopts::Matches) -> Result<(), Error> {
	let files = options.opt_strs("file");
	let Some((first, rest)) = files.split_first() else {
		return Err(Error::MissingArgument);
	};
	let mut order = BuildOrder::load_from_disk(first)?;
	for file in rest {
		order.merge(BuildOrder::load_from_disk(file)?).map_err(pkggraph::Error::from)?;
	}
	if options.opt_present("reduce") {
		order.reduce();
	}
	print_order(&order, options)?;
	order.raise_errors().map_err(pkggraph::Error::from)?;
	Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("pkggraph error: {0}")]
	Pkggraph(#[from] pkggraph::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("Missing argument")]
	MissingArgument,
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
}
