use log::{error, info};
use node_addrs::Discover;

const USAGE: &str = "Usage: node-addrs addrs [-q] key=val key=val ...
       node-addrs help [provider]
";

fn help(d: &Discover, provider: Option<&str>) {
    println!("{}", USAGE);
    match provider.and_then(|name| d.registry().get(name)) {
        Some(provider) => {
            println!("{}", node_addrs::GLOBAL_HELP);
            println!("{}", provider.help());
        }
        None => println!("{}", d.help()),
    }
}

async fn get_addrs(d: &Discover, mut args: Vec<String>) -> bool {
    let quiet = match args.first() {
        Some(flag) if flag == "-q" => {
            args.remove(0);
            true
        }
        _ => false,
    };

    if !quiet {
        info!("Registered providers: {:?}", d.names());
    }

    let logger = if quiet { None } else { Some(log::logger()) };
    match d.addrs(&args.join(" "), logger).await {
        Ok(addrs) => {
            println!("{}", addrs.join(" "));
            true
        }
        Err(e) => {
            error!("{}", e);
            false
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let d = Discover::default();
    let mut args: Vec<_> = std::env::args().skip(1).collect();

    if args.is_empty() {
        help(&d, None);
        return;
    }

    let cmd = args.remove(0);

    match &cmd[..] {
        "addrs" => {
            if !get_addrs(&d, args).await {
                std::process::exit(1);
            }
        }
        _ => help(&d, args.first().map(String::as_str)),
    }
}
