//! Built-in directives
//!
//! Each module registers one family of directives against a fresh
//! [`Tendril`]. Handlers only talk to the runtime through
//! [`crate::DirectiveContext`], the same surface plugins get.

mod bind;
mod content;
mod data;
mod ignore;
mod init;
mod list;
mod model;
mod on;
mod refs;
mod show;
mod teleport;
mod transition;

mod conditional;

pub use bind::{bind_attribute, bind_value};
pub use on::{listen, Listen};

use crate::runtime::Tendril;

pub(crate) fn register_builtins(tendril: &Tendril) {
    data::register(tendril);
    bind::register(tendril);
    on::register(tendril);
    model::register(tendril);
    show::register(tendril);
    conditional::register(tendril);
    list::register(tendril);
    teleport::register(tendril);
    refs::register(tendril);
    content::register(tendril);
    init::register(tendril);
    ignore::register(tendril);
    transition::register(tendril);
}
