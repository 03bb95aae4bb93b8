use std::sync::Arc;

use gpui::{
    AnyElement, Context, InteractiveElement, IntoElement, MouseButton, ObjectFit, ParentElement,
    RenderImage, SharedString, Styled, StyledImage, Window, div, img, prelude::FluentBuilder,
};
use gpui_component::{StyledExt, h_flex, v_flex};

use super::{AppView, render_util::canvas_to_image, startup::ReadyShow};
use crate::{
    config::Rgb,
    render::render_stage,
    scene::ChromePalette,
    show::{Action, KEY_BINDINGS},
};

const DESCRIPTION: &str =
    "Raise one or two hands in front of the camera. Open your hand to make a puppet talk.";
const TEXT_COLOR: u32 = 0xffffff;

fn color(rgb: Rgb) -> gpui::Rgba {
    gpui::rgb(rgb.to_hex())
}

impl AppView {
    pub(super) fn render_show(
        &mut self,
        ready: &mut ReadyShow,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        self.draw_stage_frame(ready, window, cx);

        let palette = self.show.scene().palette();
        let stage: AnyElement = match &self.latest_image {
            Some(image) => img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element(),
            None => div()
                .text_sm()
                .text_color(color(palette.bottom_bar))
                .child("Waiting for camera...")
                .into_any_element(),
        };

        v_flex()
            .flex_1()
            .w_full()
            .child(
                div()
                    .w_full()
                    .px_4()
                    .py_2()
                    .bg(color(palette.description_bar))
                    .text_sm()
                    .text_color(gpui::rgb(TEXT_COLOR))
                    .child(DESCRIPTION),
            )
            .child(
                div()
                    .flex_1()
                    .w_full()
                    .p_3()
                    .flex()
                    .items_center()
                    .justify_center()
                    .overflow_hidden()
                    .child(stage),
            )
            .child(self.render_bottom_bar(palette, cx))
            .into_any_element()
    }

    /// Draws the current scene and hands into the canvas and swaps it in as
    /// the displayed image.
    fn draw_stage_frame(
        &mut self,
        ready: &mut ReadyShow,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        let hands = ready.hands.latest();
        let (width, height) = ready.camera.resolution();
        let scene = self.show.scene();

        self.canvas.begin_frame(width, height);
        render_stage(
            &mut self.canvas,
            scene.scene(),
            scene.accent(),
            &hands,
            &ready.assets,
        );

        if let Some(image) = canvas_to_image(&self.canvas) {
            self.replace_latest_image(image, window, cx);
        }
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // The sprite atlas keeps every uploaded frame until dropped.
            cx.drop_image(old_image, Some(window));
        }
    }

    fn render_bottom_bar(&self, palette: ChromePalette, cx: &mut Context<'_, Self>) -> AnyElement {
        let mut bar = h_flex()
            .w_full()
            .flex_wrap()
            .justify_center()
            .gap_2()
            .px_4()
            .py_3()
            .bg(color(palette.bottom_bar));

        for (key, action) in KEY_BINDINGS {
            let caption = match action {
                Action::ToggleMute => self.show.audio().mute_label().to_string(),
                _ => action.label(),
            };
            let active = match action {
                Action::SelectScene(scene) => self.show.scene().is_active(scene),
                _ => false,
            };

            bar = bar.child(
                div()
                    .id(SharedString::from(format!("action-{key}")))
                    .px_3()
                    .py_2()
                    .rounded_md()
                    .cursor_pointer()
                    .border_1()
                    .border_color(if active {
                        gpui::rgb(TEXT_COLOR)
                    } else {
                        gpui::rgba(0xffffff00)
                    })
                    .text_sm()
                    .when(active, |this| this.font_semibold())
                    .text_color(gpui::rgb(TEXT_COLOR))
                    .hover(|s| s.bg(color(palette.button_hover)))
                    .on_mouse_down(
                        MouseButton::Left,
                        cx.listener(move |this, _, _, cx| {
                            this.show.dispatch(action);
                            cx.notify();
                        }),
                    )
                    .child(caption),
            );
        }

        bar.into_any_element()
    }
}
