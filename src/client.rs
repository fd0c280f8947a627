//! Application controller: owns the dispatchers, the raffle directory, and
//! the event subscription, and folds everything into the snapshot the UI
//! renders.

use crate::actions::RaffleActions;
use crate::config::{AppConfig, WalletConfig};
use crate::directory::RaffleDirectory;
use crate::event_feed::{EventFeed, EventFeedSubscription};
use crate::events::{
    EventRecord, ProcessedEvents, RaffleEvent, WinnerRecord, fold_account_activity,
};
use crate::ledger::{Address, Ledger, ObjectId, Wallet};
use crate::rpc::JsonRpcLedger;
use crate::snapshot::RaffleSnapshot;
use crate::ui;
use crate::wallet::{self, KeystoreWallet};
use color_eyre::eyre::{Result, WrapErr};
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

const ERROR_BUFFER_DEPTH: usize = 50;
const LIST_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Everything the UI needs to draw one frame.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub account: Address,
    pub network: String,
    pub raffles: Vec<RaffleSnapshot>,
    pub my_raffles: Vec<ObjectId>,
    pub joined_raffles: Vec<ObjectId>,
    pub winners: Vec<WinnerRecord>,
    pub selected: usize,
    pub loading: bool,
    pub status: String,
    pub errors: Vec<String>,
}

/// Render a smallest-denomination amount in base units, two decimals.
pub fn format_units(amount: u64) -> String {
    format!("{:.2}", amount as f64 / 1_000_000_000f64)
}

pub struct AppController<L, W>
where
    L: Ledger + Clone + Send + Sync + 'static,
    W: Wallet,
{
    actions: RaffleActions<L, W>,
    directory: RaffleDirectory<L>,
    feed: EventFeed<L>,
    account: Address,
    network: String,
    raffles: Vec<RaffleSnapshot>,
    my_raffles: Vec<ObjectId>,
    joined_raffles: Vec<ObjectId>,
    winners: Vec<WinnerRecord>,
    processed: ProcessedEvents,
    selected: usize,
    loading: bool,
    status: String,
    errors: Vec<String>,
}

impl<L, W> AppController<L, W>
where
    L: Ledger + Clone + Send + Sync + 'static,
    W: Wallet,
{
    pub fn new(
        ledger: L,
        wallet: W,
        package: ObjectId,
        network: String,
        poll_interval: Duration,
    ) -> Self {
        let account = wallet.address();
        let actions = RaffleActions::new(ledger.clone(), wallet, package);
        let directory = RaffleDirectory::new(ledger.clone(), package);
        let feed = EventFeed::new(ledger, package, poll_interval);
        Self {
            actions,
            directory,
            feed,
            account,
            network,
            raffles: Vec::new(),
            my_raffles: Vec::new(),
            joined_raffles: Vec::new(),
            winners: Vec::new(),
            processed: ProcessedEvents::new(),
            selected: 0,
            loading: false,
            status: String::from("Ready"),
            errors: Vec::new(),
        }
    }

    pub fn subscribe_events(&self) -> EventFeedSubscription {
        self.feed.subscribe()
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            account: self.account,
            network: self.network.clone(),
            raffles: self.raffles.clone(),
            my_raffles: self.my_raffles.clone(),
            joined_raffles: self.joined_raffles.clone(),
            winners: self.winners.clone(),
            selected: self.selected,
            loading: self.loading,
            status: self.status.clone(),
            errors: self.errors.iter().rev().take(5).cloned().collect(),
        }
    }

    /// Fold one polled batch into the derived views. The batch replaces the
    /// previous event view wholesale; the seen-set keeps winner
    /// notifications from firing more than once per on-chain event.
    pub fn ingest_events(&mut self, batch: Vec<EventRecord>) {
        let activity = fold_account_activity(&batch, &self.account);
        self.my_raffles = activity.created;
        self.joined_raffles = activity.joined;
        self.winners = activity.winners;

        for record in &batch {
            if let RaffleEvent::WinnerPicked(picked) = &record.event
                && self.processed.mark(record)
            {
                info!(
                    raffle = %picked.raffle_id,
                    winner = %picked.winner,
                    "winner picked"
                );
                self.status = format!(
                    "Winner picked for raffle {}: {} ({} won)",
                    picked.raffle_id.short(),
                    picked.winner.short(),
                    format_units(picked.prize_amount),
                );
            }
        }
    }

    pub async fn refresh_raffles(&mut self) {
        self.loading = true;
        match self.directory.list().await {
            Ok(raffles) => {
                self.raffles = raffles;
                if self.selected >= self.raffles.len() {
                    self.selected = self.raffles.len().saturating_sub(1);
                }
            }
            Err(err) => {
                self.push_errors(vec![format!("refresh failed: {err:#}")]);
            }
        }
        self.loading = false;
    }

    pub fn select_next(&mut self) {
        if !self.raffles.is_empty() {
            self.selected = (self.selected + 1) % self.raffles.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.raffles.is_empty() {
            self.selected = (self.selected + self.raffles.len() - 1) % self.raffles.len();
        }
    }

    fn selected_raffle(&self) -> Option<ObjectId> {
        self.raffles.get(self.selected).map(|raffle| raffle.id)
    }

    pub async fn create_raffle(&mut self) {
        match self.actions.create_raffle().await {
            Ok(receipt) => {
                self.set_status(format!("Raffle created ({})", receipt.digest));
                self.refresh_raffles().await;
            }
            Err(err) => {
                self.status = String::from("Create failed");
                self.push_errors(vec![format!("create raffle: {err}")]);
            }
        }
    }

    pub async fn join_selected(&mut self) {
        let Some(raffle_id) = self.selected_raffle() else {
            self.set_status("No raffle selected");
            return;
        };
        match self.actions.join_raffle(&raffle_id).await {
            Ok(_) => {
                self.set_status(format!("Joined raffle {}", raffle_id.short()));
                self.directory.reader().invalidate(&raffle_id);
                self.refresh_raffles().await;
            }
            Err(err) => {
                self.status = format!("Join failed for {}", raffle_id.short());
                self.push_errors(vec![format!("join raffle: {err}")]);
            }
        }
    }

    pub async fn pick_winner_selected(&mut self) {
        let Some(raffle_id) = self.selected_raffle() else {
            self.set_status("No raffle selected");
            return;
        };
        match self.actions.pick_winner(&raffle_id).await {
            Ok(_) => {
                self.set_status(format!("Winner drawn for {}", raffle_id.short()));
                self.directory.reader().invalidate(&raffle_id);
                self.refresh_raffles().await;
            }
            Err(err) => {
                self.status = format!("Pick winner failed for {}", raffle_id.short());
                self.push_errors(vec![format!("pick winner: {err}")]);
            }
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > ERROR_BUFFER_DEPTH {
            let drain = self.errors.len() - ERROR_BUFFER_DEPTH;
            self.errors.drain(0..drain);
        }
    }
}

/// Wire everything together from the resolved configuration and hand the
/// terminal to the UI loop.
pub async fn run_app(config: AppConfig) -> Result<()> {
    let package = config.resolve_package_id()?;
    let url = config.resolve_rpc_url();
    info!(network = config.network.name(), %url, %package, "connecting");

    let ledger = JsonRpcLedger::new(url)?;

    let WalletConfig::Keystore { owner, dir } = &config.wallets;
    let descriptor = wallet::find_wallet(dir, owner).wrap_err("Unable to locate wallet")?;
    let key = wallet::unlock_signing_key(&descriptor)?;
    let session = KeystoreWallet::new(ledger.clone(), key);

    let mut controller = AppController::new(
        ledger,
        session,
        package,
        config.network.name().to_string(),
        config.poll_interval,
    );

    let mut ui_state = ui::UiState::default();
    ui::terminal_enter(&mut ui_state)?;
    let result = run_loop(&mut controller, &mut ui_state).await;
    ui::terminal_exit()?;
    result
}

async fn run_loop<L, W>(
    controller: &mut AppController<L, W>,
    ui_state: &mut ui::UiState,
) -> Result<()>
where
    L: Ledger + Clone + Send + Sync + 'static,
    W: Wallet,
{
    let mut subscription = controller.subscribe_events();
    let mut refresh_ticker = time::interval(LIST_REFRESH_INTERVAL);

    controller.refresh_raffles().await;
    ui::draw(ui_state, &controller.snapshot())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = refresh_ticker.tick() => {
                controller.refresh_raffles().await;
            }
            batch = subscription.next_batch() => {
                if let Some(batch) = batch {
                    controller.ingest_events(batch);
                }
            }
            user_event = ui::next_event(ui_state) => {
                match user_event? {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Refresh => controller.refresh_raffles().await,
                    ui::UserEvent::NextRaffle => controller.select_next(),
                    ui::UserEvent::PrevRaffle => controller.select_prev(),
                    ui::UserEvent::Create => controller.create_raffle().await,
                    ui::UserEvent::ConfirmJoin => controller.join_selected().await,
                    ui::UserEvent::ConfirmPickWinner => controller.pick_winner_selected().await,
                    ui::UserEvent::Redraw => {}
                }
            }
        }
        ui::draw(ui_state, &controller.snapshot())?;
    }

    subscription.stop();
    Ok(())
}
