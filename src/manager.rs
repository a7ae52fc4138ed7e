//! # Interactive Manager Console
//!
//! The manager is the operator's terminal: it owns one management channel
//! per host (spec §4.6), forwards typed commands to whichever host is
//! currently active, and prints whatever that host (or any other host,
//! asynchronously) replies with. Switches and the name server have no
//! management channel; they run unattended.

use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// One host's management endpoint, as seen from the manager side.
pub struct ManagerHandle {
    pub node_id: u8,
    pub cmd_tx: mpsc::Sender<String>,
    pub reply_rx: mpsc::Receiver<String>,
}

pub struct Manager {
    hosts: Vec<ManagerHandle>,
    active: usize,
}

impl Manager {
    pub fn new(hosts: Vec<ManagerHandle>) -> Self {
        Self { hosts, active: 0 }
    }

    /// Builds a manager whose initially active host is `active_id`, falling
    /// back to the first configured host if no such id exists.
    pub fn with_active(hosts: Vec<ManagerHandle>, active_id: u8) -> Self {
        let active = hosts.iter().position(|h| h.node_id == active_id).unwrap_or(0);
        Self { hosts, active }
    }

    /// Runs the console until the operator quits or stdin closes. Returns
    /// the process exit code.
    pub async fn run(mut self) -> i32 {
        if self.hosts.is_empty() {
            println!("no hosts configured; nothing to manage");
            return 0;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            self.drain_replies();
            self.prompt();

            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(text)) => {
                            if let Some(code) = self.dispatch(&text) {
                                return code;
                            }
                        }
                        Ok(None) => return 0, // stdin closed (EOF)
                        Err(_) => return 1,
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(150)) => {
                    // loop back around to drain async replies between keystrokes
                }
            }
        }
    }

    fn prompt(&self) {
        print!("netsim[{}]> ", self.hosts[self.active].node_id);
        let _ = std::io::stdout().flush();
    }

    fn drain_replies(&mut self) {
        for handle in self.hosts.iter_mut() {
            while let Ok(msg) = handle.reply_rx.try_recv() {
                println!("\n[host {}] {}", handle.node_id, msg);
            }
        }
    }

    /// Handles one line of operator input. Returns `Some(exit_code)` if the
    /// console should stop, `None` to keep going.
    fn dispatch(&mut self, line: &str) -> Option<i32> {
        let mut parts = line.trim().split_whitespace();
        let letter = parts.next()?;
        match letter {
            "q" => Some(0),
            "c" => {
                self.switch_active(parts.next());
                None
            }
            "l" => {
                for h in &self.hosts {
                    println!("host {}", h.node_id);
                }
                None
            }
            _ => {
                let _ = self.hosts[self.active].cmd_tx.try_send(line.to_string());
                None
            }
        }
    }

    fn switch_active(&mut self, id_token: Option<&str>) {
        let Some(id_token) = id_token else {
            println!("usage: c <host id>");
            return;
        };
        let Ok(id) = id_token.parse::<u8>() else {
            println!("'{id_token}' is not a valid host id");
            return;
        };
        match self.hosts.iter().position(|h| h.node_id == id) {
            Some(idx) => self.active = idx,
            None => println!("no host with id {id}"),
        }
    }
}
