//! Tag subcommands.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use crate::library::{LibraryService, TagQuery};

/// Tag-related subcommands
#[derive(Subcommand, Debug)]
pub enum TagCommands {
    /// Show one tag
    Show {
        /// Tag name
        name: String,
    },

    /// Write the cover thumbnail of a tag's first entry
    Thumbnail {
        name: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Mark a tag as favorite
    Favorite {
        name: String,

        /// Remove the mark instead
        #[arg(long)]
        off: bool,
    },
}

pub async fn execute(service: &LibraryService, user: &str, command: TagCommands) -> Result<()> {
    match command {
        TagCommands::Show { name } => {
            let detail = service.tag_detail(user, &name).await?;
            println!("ID:       {}", detail.id);
            println!("Name:     {}", detail.name);
            println!("Favorite: {}", detail.is_favorite);
            println!("Hidden:   {}", detail.is_hidden);
            println!("Entries:  {}", detail.entry_count);
            Ok(())
        }
        TagCommands::Thumbnail { name, output } => {
            let payload = service.tag_thumbnail(&name).await?;
            super::write_payload(&payload, output).await
        }
        TagCommands::Favorite { name, off } => {
            let favorite = service.tag_set_favorite(user, &name, !off).await?;
            println!("Tag {} favorite: {}", name, favorite);
            Ok(())
        }
    }
}

/// List tags as a table
pub async fn list_tags(service: &LibraryService, query: &TagQuery) -> Result<()> {
    let list = service.tag_list(query).await?;

    if list.items.is_empty() {
        println!("No tags found");
        return Ok(());
    }

    println!("{:<6} {:<4} {:<8} {}", "ID", "FAV", "ENTRIES", "NAME");
    println!("{}", "-".repeat(60));
    for item in &list.items {
        println!(
            "{:<6} {:<4} {:<8} {}",
            item.id,
            if item.is_favorite { "*" } else { "" },
            item.entry_count,
            item.name
        );
    }

    println!();
    println!("Page {} of {}", list.page + 1, list.total_pages.max(1));
    Ok(())
}
