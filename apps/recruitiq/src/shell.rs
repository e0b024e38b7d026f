//! Routed terminal views over the application context.

use std::sync::Arc;

use anyhow::Result;
use client_core::{
    presentation::RenderedResult,
    routing::HOME_PATH,
    views::{self, AuthForm, FormPurpose, ViewOutcome},
    AppContext, Route, RoutingShell, SelectionSource, SubmitOutcome, UploadAnalyzeWorkflow,
    WorkflowEvent,
};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, info};

use crate::{
    commands::{self, Command},
    picker,
    prompt::{InputLines, TerminalPrompt},
};

const APP_TITLE: &str = "ATS Score Checker";
const APP_TAGLINE: &str = "Compare your resume against job descriptions";
const SIGN_IN_TITLE: &str = "Sign in to your account";
const SIGN_UP_TITLE: &str = "Create your account";
const JOB_DESCRIPTION_PLACEHOLDER: &str = "Paste the job description here...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

enum Input {
    Route(Route),
    Line(String),
}

/// Workflow owned by a mounted home view. Unmounting tears it down so late
/// results are dropped.
struct HomeView {
    workflow: Arc<UploadAnalyzeWorkflow>,
    progress: JoinHandle<()>,
}

impl HomeView {
    fn mount(ctx: &AppContext) -> Self {
        let workflow = ctx.mount_workflow();
        let mut events = workflow.subscribe_events();
        let progress = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(WorkflowEvent::UploadStarted { path }) => println!("Uploading {path} ..."),
                    Ok(WorkflowEvent::Uploaded(stored)) => {
                        println!("Uploaded {} bytes, analyzing ...", stored.size_bytes)
                    }
                    Ok(WorkflowEvent::Analyzed(_) | WorkflowEvent::Failed { .. }) => {}
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "progress output lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Self { workflow, progress }
    }

    async fn unmount(self) {
        self.workflow.teardown().await;
        self.progress.abort();
    }
}

pub struct Shell {
    ctx: AppContext,
    prompt: Arc<TerminalPrompt>,
    input: InputLines,
    routing: RoutingShell,
    route: Option<Route>,
    form: AuthForm,
    home: Option<HomeView>,
}

impl Shell {
    pub fn new(ctx: AppContext, prompt: Arc<TerminalPrompt>, input: InputLines) -> Self {
        let routing = ctx.routing_shell();
        Self {
            ctx,
            prompt,
            input,
            routing,
            route: None,
            form: AuthForm::default(),
            home: None,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        println!("{APP_TITLE}\n{APP_TAGLINE}\n");
        let initial = self.routing.current();
        self.enter(initial).await;

        loop {
            let next = tokio::select! {
                route = self.routing.changed() => match route {
                    Some(route) => Input::Route(route),
                    None => break,
                },
                line = read_line(&self.input) => match line? {
                    Some(line) => Input::Line(line),
                    None => break,
                },
            };
            let flow = match next {
                Input::Route(route) => {
                    self.enter(route).await;
                    Flow::Continue
                }
                Input::Line(line) => self.handle(commands::parse(&line)).await,
            };
            if flow == Flow::Quit {
                break;
            }
        }

        if let Some(home) = self.home.take() {
            home.unmount().await;
        }
        self.ctx.teardown();
        Ok(())
    }

    async fn enter(&mut self, route: Route) {
        if self.route == Some(route) {
            return;
        }
        debug!(from = ?self.route, to = ?route, "route changed");
        if self.route == Some(Route::Home) {
            if let Some(home) = self.home.take() {
                home.unmount().await;
            }
        }
        self.route = Some(route);

        match route {
            Route::Placeholder => println!("Loading..."),
            Route::SignIn | Route::SignUp => {
                self.form = AuthForm::default();
                let title = if route == Route::SignIn {
                    SIGN_IN_TITLE
                } else {
                    SIGN_UP_TITLE
                };
                println!("\n== {title} ==\n{}", commands::help(false));
            }
            Route::Home => {
                self.home = Some(HomeView::mount(&self.ctx));
                if let Some(identity) = self.ctx.session().current_identity() {
                    info!(uid = %identity.uid, "home view mounted");
                    println!("\n== {APP_TITLE} ==\nSigned in as {}", identity.label());
                }
                println!(
                    "Job description: {JOB_DESCRIPTION_PLACEHOLDER}\n{}",
                    commands::help(true)
                );
            }
        }
    }

    async fn handle(&mut self, command: Command) -> Flow {
        let Some(route) = self.route else {
            return Flow::Continue;
        };
        match command {
            Command::Empty => {}
            Command::Quit => return Flow::Quit,
            Command::Help => println!("{}", commands::help(route == Route::Home)),
            Command::Unknown(line) => println!("Unknown command '{line}'; type help"),
            command => match route {
                Route::Placeholder => println!("Still checking your session..."),
                Route::SignIn | Route::SignUp => self.handle_auth(route, command).await,
                Route::Home => self.handle_home(command).await,
            },
        }
        Flow::Continue
    }

    async fn handle_auth(&mut self, route: Route, command: Command) {
        let purpose = if route == Route::SignUp {
            FormPurpose::SignUp
        } else {
            FormPurpose::SignIn
        };
        let session = Arc::clone(self.ctx.session());
        match command {
            Command::Email(email) => self.form.email = email,
            Command::Password(password) => self.form.password = password,
            Command::Confirm(password) if purpose == FormPurpose::SignUp => {
                self.form.confirm_password = password
            }
            Command::Submit => {
                let outcome = match purpose {
                    FormPurpose::SignIn => self.form.sign_in(&session).await,
                    FormPurpose::SignUp => self.form.sign_up(&session).await,
                };
                self.apply(outcome).await;
            }
            Command::Google => {
                let outcome = self.form.federated(&session, purpose).await;
                self.apply(outcome).await;
            }
            Command::Callback(callback_url) => {
                self.prompt.deliver_redirect_callback(callback_url).await;
                match session.resume_redirect().await {
                    Ok(Some(_)) => self.apply(ViewOutcome::Navigate(HOME_PATH)).await,
                    Ok(None) => println!("No Google sign-in is waiting for a callback"),
                    Err(err) => println!("! {}", err.user_message()),
                }
            }
            Command::Navigate(path) => {
                let route = self.routing.navigate(path);
                self.enter(route).await;
            }
            _ => println!("Not available here; type help"),
        }
    }

    async fn handle_home(&mut self, command: Command) {
        let Some(workflow) = self.home.as_ref().map(|home| Arc::clone(&home.workflow)) else {
            return;
        };
        match command {
            Command::Select(_) | Command::Drop(_) => {
                let (path, source) = match command {
                    Command::Drop(path) => (path, SelectionSource::DragAndDrop),
                    Command::Select(path) => (path, SelectionSource::Picker),
                    _ => return,
                };
                match picker::load_candidate(&path).await {
                    Ok(candidate) => {
                        let name = candidate.name.clone();
                        match workflow.select_file(candidate, source).await {
                            Ok(()) => println!("Selected {name}"),
                            Err(err) => println!("! {}", err.user_message()),
                        }
                    }
                    Err(err) => println!("! {err:#}"),
                }
            }
            Command::JobDescription(text) => {
                let text = if text.is_empty() {
                    self.read_multiline().await
                } else {
                    text
                };
                workflow.set_job_description(text).await;
            }
            Command::Submit => {
                tokio::spawn(async move {
                    match workflow.submit().await {
                        Ok(SubmitOutcome::Analyzed(_)) => {
                            if let Some(rendered) = workflow.overlay().await.render() {
                                print_result(&rendered);
                            }
                        }
                        Ok(SubmitOutcome::AlreadyInFlight) => {
                            println!("An analysis is already running")
                        }
                        Ok(SubmitOutcome::Discarded) => {}
                        Err(err) => println!("! {}", err.user_message()),
                    }
                });
            }
            Command::Dismiss => workflow.dismiss_result().await,
            Command::Status => {
                let draft = workflow.draft().await;
                let description = match draft.job_description() {
                    "" => JOB_DESCRIPTION_PLACEHOLDER,
                    text => text,
                };
                println!("Resume: {}", draft.file_label());
                println!("Job description: {description}");
                println!("[{}]", workflow.submit_label());
                if let Some(rendered) = workflow.overlay().await.render() {
                    print_result(&rendered);
                }
            }
            Command::Logout => {
                let outcome = views::sign_out(self.ctx.session()).await;
                self.apply(outcome).await;
            }
            _ => println!("Not available here; type help"),
        }
    }

    async fn apply(&mut self, outcome: ViewOutcome) {
        match outcome {
            ViewOutcome::Navigate(path) => {
                let route = self.routing.navigate(path);
                self.enter(route).await;
            }
            ViewOutcome::Stay => {}
            ViewOutcome::Error(message) => println!("! {message}"),
        }
    }

    async fn read_multiline(&self) -> String {
        println!("{JOB_DESCRIPTION_PLACEHOLDER} (finish with a line containing only '.')");
        let mut lines = Vec::new();
        let mut input = self.input.lock().await;
        while let Ok(Some(line)) = input.next_line().await {
            if line.trim() == "." {
                break;
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

async fn read_line(input: &InputLines) -> std::io::Result<Option<String>> {
    input.lock().await.next_line().await
}

fn print_result(rendered: &RenderedResult) {
    println!(
        "\n== {} ==\n{}\n{}\n(dismiss to close)",
        rendered.heading, rendered.score_label, rendered.message
    );
}
