use std::{
    io::{self, Write},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    DirectoryStore, HttpContactRepository, NoToken, StaticToken, SyncController, TokenProvider,
};
use shared::domain::{initials, Contact, ContactDraft, ContactId, NO_PHOTO};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "contacts", about = "Inspect and edit a contact directory")]
struct Cli {
    /// Base URL of the contact service. Falls back to CONTACTS_SERVER_URL.
    #[arg(long)]
    server_url: Option<String>,
    /// Bearer token for the service. Falls back to CONTACTS_TOKEN.
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every contact in the directory
    List,
    /// Show one contact in full
    Show { id: String },
    /// Add a new contact
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        photo_url: Option<String>,
    },
    /// Replace fields of an existing contact (unset flags keep their value)
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        photo_url: Option<String>,
    },
    /// Delete a contact (asks for confirmation unless --yes)
    Remove {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let server_url = cli
        .server_url
        .or_else(|| std::env::var("CONTACTS_SERVER_URL").ok())
        .context("pass --server-url or set CONTACTS_SERVER_URL")?;
    let token: Arc<dyn TokenProvider> = match cli
        .token
        .or_else(|| std::env::var("CONTACTS_TOKEN").ok())
    {
        Some(token) => Arc::new(StaticToken(token)),
        None => Arc::new(NoToken),
    };

    let base_url = Url::parse(&server_url).context("invalid server url")?;
    let repository = Arc::new(HttpContactRepository::new(base_url, token));
    let controller = SyncController::new(repository, Arc::new(DirectoryStore::new()));

    match cli.command {
        Command::List => {
            controller.refresh().await?;
            let model = controller.read_model().await;
            if model.is_empty() {
                println!("no contacts found");
            } else {
                for contact in &model.contacts {
                    println!("{}", summary_line(contact));
                }
                println!("{} contacts found", model.contacts.len());
            }
        }
        Command::Show { id } => {
            let contact = controller.load_contact(&ContactId(id)).await?;
            print_contact(&contact);
        }
        Command::Add {
            name,
            email,
            phone,
            address,
            photo_url,
        } => {
            let draft = ContactDraft {
                name,
                email,
                phone,
                address,
                photo_url: photo_url.unwrap_or_else(|| NO_PHOTO.to_string()),
            };
            let created = controller.submit_create(draft).await?;
            println!("created contact {}", created.id);
        }
        Command::Edit {
            id,
            name,
            email,
            phone,
            address,
            photo_url,
        } => {
            let id = ContactId(id);
            let mut draft = ContactDraft::from(controller.load_contact(&id).await?);
            if let Some(name) = name {
                draft.name = name;
            }
            if let Some(email) = email {
                draft.email = email;
            }
            if let Some(phone) = phone {
                draft.phone = phone;
            }
            if let Some(address) = address {
                draft.address = address;
            }
            if let Some(photo_url) = photo_url {
                draft.photo_url = photo_url;
            }
            let updated = controller.submit_update(&id, draft).await?;
            println!("updated contact {}", updated.id);
        }
        Command::Remove { id, yes } => {
            controller.refresh().await?;
            let id = ContactId(id);
            if !controller.request_delete(&id).await {
                bail!("no contact with id {id}");
            }
            if !yes && !confirmed_on_stdin(&id)? {
                controller.cancel_delete().await;
                println!("aborted");
                return Ok(());
            }
            controller.confirm_delete(&id).await?;
            println!("deleted contact {id}");
        }
    }

    Ok(())
}

fn confirmed_on_stdin(id: &ContactId) -> Result<bool> {
    print!("delete contact {id}? [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y"))
}

fn summary_line(contact: &Contact) -> String {
    let avatar = if contact.has_photo() {
        contact.photo_url.clone()
    } else {
        format!("[{}]", initials(&contact.name))
    };
    format!(
        "{}  {}  {}  {}  ({})",
        avatar, contact.name, contact.phone, contact.email, contact.id
    )
}

fn print_contact(contact: &Contact) {
    println!("id:      {}", contact.id);
    println!("name:    {}", contact.name);
    println!("email:   {}", contact.email);
    println!("phone:   {}", contact.phone);
    println!("address: {}", contact.address);
    if contact.has_photo() {
        println!("photo:   {}", contact.photo_url);
    }
}
