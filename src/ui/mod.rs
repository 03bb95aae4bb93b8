use std::{mem, sync::Arc, thread};

use crossbeam_channel::{Receiver, unbounded};
use gpui::{
    AnyElement, App, AppContext, Context, FocusHandle, InteractiveElement, IntoElement,
    KeyDownEvent, ParentElement, Render, RenderImage, SharedString, Styled, TitlebarOptions,
    Window, WindowDecorations, WindowOptions, div, px,
};
use gpui_component::{
    ActiveTheme, Root, StyledExt,
    button::{Button, ButtonVariants},
    tag::Tag,
    v_flex,
};

use crate::{
    audio::{AudioOutput, RodioOutput, SilentOutput},
    config::ShowConfig,
    model_download::DownloadProgress,
    render::PixelCanvas,
    show::Show,
};

mod render_util;
mod stage;
mod startup;
mod titlebar;

use startup::{ReadyShow, StartupMessage};

pub const WINDOW_TITLE: &str = "Puppet Show";

pub fn launch_ui(app: &mut App, config: ShowConfig) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some(WINDOW_TITLE.into()),
            appears_transparent: true,
            traffic_light_position: None,
        }),
        window_decorations: Some(WindowDecorations::Client),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|cx| AppView::new(config, cx));
        let focus = view.read(app).focus_handle.clone();
        window.focus(&focus);
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    config: ShowConfig,
    screen: Screen,
    show: Show<Box<dyn AudioOutput>>,
    startup_rx: Receiver<StartupMessage>,
    _startup_handle: thread::JoinHandle<()>,
    canvas: PixelCanvas,
    latest_image: Option<Arc<RenderImage>>,
    focus_handle: FocusHandle,
}

enum Screen {
    Preparing(PreparingState),
    Show(ReadyShow),
    Failed { message: String },
}

struct PreparingState {
    progress: DownloadProgress,
    message: String,
}

impl PreparingState {
    fn new() -> Self {
        Self {
            progress: DownloadProgress::default(),
            message: "Loading assets...".to_string(),
        }
    }
}

fn open_audio(config: &ShowConfig) -> Box<dyn AudioOutput> {
    match RodioOutput::open(&config.assets_dir) {
        Ok(output) => Box::new(output),
        Err(err) => {
            log::warn!("{err}; the show will be silent");
            Box::new(SilentOutput)
        }
    }
}

impl AppView {
    fn new(config: ShowConfig, cx: &mut Context<'_, Self>) -> Self {
        let show = Show::new(config.initial_scene, config.accent, open_audio(&config));
        let (startup_tx, startup_rx) = unbounded();
        let startup_handle = startup::spawn_startup(config.clone(), startup_tx);

        Self {
            config,
            screen: Screen::Preparing(PreparingState::new()),
            show,
            startup_rx,
            _startup_handle: startup_handle,
            canvas: PixelCanvas::new(1, 1),
            latest_image: None,
            focus_handle: cx.focus_handle(),
        }
    }

    /// Drops whatever the last attempt left behind and starts over.
    fn retry(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        log::info!("retrying startup");
        if let Some(old) = self.latest_image.take() {
            cx.drop_image(old, Some(window));
        }
        let (startup_tx, startup_rx) = unbounded();
        self.startup_rx = startup_rx;
        self._startup_handle = startup::spawn_startup(self.config.clone(), startup_tx);
        self.screen = Screen::Preparing(PreparingState::new());
        cx.notify();
    }

    fn on_key_down(
        &mut self,
        event: &KeyDownEvent,
        _: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if !matches!(self.screen, Screen::Show(_)) {
            return;
        }
        if self.show.press_key(&event.keystroke.key) {
            cx.notify();
        }
    }

    fn render_preparing(&self, state: &PreparingState, cx: &mut Context<'_, Self>) -> AnyElement {
        let theme = cx.theme();
        let bar = render_util::progress_bar_string(state.progress.fraction());

        v_flex()
            .flex_1()
            .items_center()
            .justify_center()
            .child(
                v_flex()
                    .gap_3()
                    .p_6()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.group_box)
                    .child(
                        div()
                            .font_semibold()
                            .text_color(theme.foreground)
                            .child("Setting up the stage"),
                    )
                    .child(
                        div()
                            .px_3()
                            .py_2()
                            .rounded_md()
                            .bg(theme.muted)
                            .font_family(theme.mono_font_family.clone())
                            .text_color(theme.foreground)
                            .child(bar),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.muted_foreground)
                            .child(state.message.clone()),
                    ),
            )
            .into_any_element()
    }

    fn render_failed(&self, message: &str, cx: &mut Context<'_, Self>) -> AnyElement {
        let theme = cx.theme();

        v_flex()
            .flex_1()
            .items_center()
            .justify_center()
            .child(
                v_flex()
                    .gap_3()
                    .p_6()
                    .max_w(px(520.0))
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.group_box)
                    .child(
                        div()
                            .font_semibold()
                            .text_color(theme.foreground)
                            .child("The puppets could not start"),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.muted_foreground)
                            .child(
                                "Check that a camera is connected and the assets folder is \
                                 complete, then try again.",
                            ),
                    )
                    .child(Tag::danger().rounded_full().child(message.to_string()))
                    .child(
                        Button::new(SharedString::from("startup-retry"))
                            .primary()
                            .label("Retry")
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.retry(window, cx);
                            })),
                    ),
            )
            .into_any_element()
    }
}

impl Render for AppView {
    fn render(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) -> impl IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        let mut screen = mem::replace(
            &mut self.screen,
            Screen::Failed {
                message: String::new(),
            },
        );
        if let Screen::Preparing(state) = &mut screen {
            if let Some(next) = self.poll_startup(state) {
                screen = next;
            }
        }

        let body = match &mut screen {
            Screen::Preparing(state) => self.render_preparing(state, cx),
            Screen::Show(ready) => self.render_show(ready, window, cx),
            Screen::Failed { message } => self.render_failed(message, cx),
        };
        self.screen = screen;

        let palette = self.show.scene().palette();
        v_flex()
            .track_focus(&self.focus_handle)
            .on_key_down(cx.listener(Self::on_key_down))
            .size_full()
            .bg(gpui::rgb(palette.page_background.to_hex()))
            .child(self.render_titlebar(palette.title_bar, window))
            .child(body)
    }
}
