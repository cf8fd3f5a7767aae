//! Built-in cartridges.

/// Boot screen: 32 horizontal bars, one per palette color, 5 pixels each.
pub const BIOS: &str = r#"
function update()

end

function draw()
    c = 0

    while c < 32 do
        -- 160 rows / 32 colors = 5 rows per bar
        base_y = c * 5

        off_y = 0
        while off_y < 5 do
            x = 0
            while x < 160 do
                pset(x, base_y + off_y, c)
                x = x + 1
            end

            off_y = off_y + 1
        end

        c = c + 1
    end
end
"#;

/// Moves a small cross with the arrow buttons; A turns it red.
pub const PLAYER: &str = r#"
player_x = 76
player_y = 76
spd = 2
color = 11 -- lime

function update()
    -- left (0) / right (1)
    if btn(0) then
        player_x = player_x - spd
    end
    if btn(1) then
        player_x = player_x + spd
    end

    -- up (2) / down (3)
    if btn(2) then
        player_y = player_y - spd
    end
    if btn(3) then
        player_y = player_y + spd
    end

    if btn(4) then
        color = 8 -- red
    else
        color = 11
    end
end

function draw()
    cls()
    pset(player_x, player_y, color)

    pset(player_x - 1, player_y, color)
    pset(player_x + 1, player_y, color)
    pset(player_x, player_y - 1, color)
    pset(player_x, player_y + 1, color)
end
"#;
