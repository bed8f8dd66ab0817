use clap::Parser;
use line_echo::config::{CliArgs, Config};
use line_echo::server::Server;
use line_echo::signal::{poll_channel_with_cancel, SignalOutcome};
use std::io::Write;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

fn config_from_file(contents: &str) -> Config {
    let path = std::env::temp_dir().join(format!("line-echo-{}.toml", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();

    let cli = CliArgs::parse_from(["line-echo", "--config", path.to_str().unwrap()]);
    let config = Config::from_cli(cli).unwrap();
    std::fs::remove_file(&path).unwrap();
    config
}

#[tokio::test]
async fn test_signal_shuts_down_server() {
    let config = config_from_file(
        r#"
        [server]
        listen = "127.0.0.1:0"

        [echo]
        mode = "accumulate"
        "#,
    );
    let server = Server::new(config);
    let listener = server.bind().unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = CancellationToken::new();
    let (signal_tx, signal_rx) = oneshot::channel();
    let waiter = poll_channel_with_cancel(signal_rx, CancellationToken::new(), {
        let shutdown = shutdown.clone();
        move || shutdown.cancel()
    });

    let serving = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { server.serve(listener, shutdown).await }
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"ping\nping\nping\n").await.unwrap();
    client.shutdown().await.unwrap();

    let mut got = Vec::new();
    client.read_to_end(&mut got).await.unwrap();
    assert_eq!(got, b"ping\nping\nping\n");
    assert!(!shutdown.is_cancelled());

    signal_tx.send(()).unwrap();

    assert_eq!(waiter.await.unwrap(), SignalOutcome::Fired);
    assert!(shutdown.is_cancelled());
    serving.await.unwrap().unwrap();
}
